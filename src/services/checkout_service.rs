// src/services/checkout_service.rs

use rust_decimal::Decimal;
use sqlx::{Acquire, Executor, PgConnection, Postgres};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    common::{error::AppError, numbering::document_number},
    db::{
        CartRepository, CatalogRepository, CustomerRepository, NewOrder, NewOrderItem, NewTransaction,
        OrderRepository, SettingsRepository, TransactionRepository,
    },
    models::{
        billing::{TransactionKind, TransactionStatus},
        customer::{AddressInput, Customer},
        sales::{OrderDetail, PlaceOrderPayload},
    },
    services::totals::{self, LineAmounts},
};

#[derive(Clone)]
pub struct CheckoutService {
    cart_repo: CartRepository,
    catalog_repo: CatalogRepository,
    customer_repo: CustomerRepository,
    order_repo: OrderRepository,
    settings_repo: SettingsRepository,
    transaction_repo: TransactionRepository,
}

impl CheckoutService {
    pub fn new(
        cart_repo: CartRepository,
        catalog_repo: CatalogRepository,
        customer_repo: CustomerRepository,
        order_repo: OrderRepository,
        settings_repo: SettingsRepository,
        transaction_repo: TransactionRepository,
    ) -> Self {
        Self {
            cart_repo,
            catalog_repo,
            customer_repo,
            order_repo,
            settings_repo,
            transaction_repo,
        }
    }

    /// Turns the customer's cart into a pending order, reserving the stock it needs.
    pub async fn place_order<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        customer: &Customer,
        customer_email: &str,
        payload: &PlaceOrderPayload,
    ) -> Result<OrderDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        // 1. Cart
        let cart = self
            .cart_repo
            .lock_cart(&mut *tx, tenant_id, customer.id)
            .await?
            .ok_or(AppError::EmptyCart)?;
        let lines = self.cart_repo.list_lines(&mut *tx, tenant_id, cart.id).await?;
        if lines.is_empty() {
            return Err(AppError::EmptyCart);
        }

        // 2. Products, locked in id order
        let mut product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        product_ids.sort();
        product_ids.dedup();
        let products: HashMap<Uuid, _> = self
            .catalog_repo
            .lock_products(&mut *tx, tenant_id, &product_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let settings = self.settings_repo.get_settings(&mut *tx, tenant_id).await?;

        let mut order_lines = Vec::with_capacity(lines.len());
        let mut sums = LineAmounts::ZERO;
        for line in &lines {
            let product = products
                .get(&line.product_id)
                .ok_or_else(|| AppError::ProductUnavailable(line.name.clone()))?;
            if !product.is_sellable() {
                return Err(AppError::ProductUnavailable(product.name.clone()));
            }
            if line.quantity > product.available() {
                return Err(AppError::InsufficientStock {
                    sku: product.sku.clone(),
                    available: product.available(),
                });
            }

            let amounts = totals::order_line(product.price, line.quantity, Decimal::ZERO, settings.tax_rate);
            sums = sums.add(amounts);
            order_lines.push((product, line.quantity, amounts));
        }

        // 3. Totals
        let shipping = totals::shipping_for(payload.shipping_method, sums.subtotal, &settings)?;
        let grand_total = totals::grand_total(sums.subtotal, sums.discount, sums.tax, shipping);

        // 4. Address snapshots
        let shipping_address = self
            .snapshot_address(&mut *tx, tenant_id, customer.id, payload.shipping_address_id, payload.shipping_address.as_ref())
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Address".into()))?;
        let billing_address = self
            .snapshot_address(&mut *tx, tenant_id, customer.id, payload.billing_address_id, payload.billing_address.as_ref())
            .await?
            .unwrap_or_else(|| shipping_address.clone());

        // 5. Order and lines
        let order_number = document_number("ORD");
        let order = self
            .order_repo
            .insert_order(
                &mut *tx,
                tenant_id,
                &NewOrder {
                    order_number: &order_number,
                    customer_id: customer.id,
                    customer_email,
                    payment_method: payload.payment_method,
                    shipping_method: payload.shipping_method,
                    currency: &settings.currency,
                    subtotal: sums.subtotal,
                    discount_amount: sums.discount,
                    tax_amount: sums.tax,
                    shipping_amount: shipping,
                    grand_total,
                    shipping_address: serde_json::to_value(&shipping_address).map_err(anyhow::Error::from)?,
                    billing_address: serde_json::to_value(&billing_address).map_err(anyhow::Error::from)?,
                    notes: payload.notes.as_deref(),
                },
            )
            .await?;

        let mut items = Vec::with_capacity(order_lines.len());
        for (product, quantity, amounts) in order_lines {
            let item = self
                .order_repo
                .insert_item(
                    &mut *tx,
                    tenant_id,
                    order.id,
                    &NewOrderItem {
                        product_id: product.id,
                        sku: &product.sku,
                        name: &product.name,
                        price: product.price,
                        quantity,
                        amounts,
                    },
                )
                .await?;
            self.catalog_repo
                .apply_stock_movement(&mut *tx, tenant_id, product.id, 0, quantity)
                .await?;
            items.push(item);
        }

        // 6. Authorization for online payments, then the cart goes away
        let mut transactions = Vec::new();
        if payload.payment_method.is_online() {
            let authorization = self
                .transaction_repo
                .insert(
                    &mut *tx,
                    tenant_id,
                    &NewTransaction {
                        order_id: order.id,
                        invoice_id: None,
                        credit_memo_id: None,
                        kind: TransactionKind::Authorization,
                        status: TransactionStatus::Pending,
                        amount: grand_total,
                        payment_method: payload.payment_method,
                        gateway_reference: None,
                        notes: None,
                    },
                )
                .await?;
            transactions.push(authorization);
        }

        self.cart_repo.clear(&mut *tx, tenant_id, cart.id).await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %order.id,
            order_number = %order.order_number,
            grand_total = %order.grand_total,
            payment_method = %order.payment_method,
            "order placed"
        );

        Ok(OrderDetail {
            header: order,
            items,
            invoices: Vec::new(),
            shipments: Vec::new(),
            credit_memos: Vec::new(),
            transactions,
        })
    }

    /// A saved address wins over an inline one.
    async fn snapshot_address(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        customer_id: Uuid,
        address_id: Option<Uuid>,
        inline: Option<&AddressInput>,
    ) -> Result<Option<AddressInput>, AppError> {
        if let Some(id) = address_id {
            let saved = self
                .customer_repo
                .find_address(&mut *conn, tenant_id, customer_id, id)
                .await?
                .ok_or_else(|| AppError::ResourceNotFound("Address".into()))?;
            return Ok(Some(AddressInput::from(&saved)));
        }
        Ok(inline.cloned())
    }
}
