use grocery_checkout_api::{
    db::{create_pool, orm_from_pool},
    dto::{cart::AddToCartRequest, orders::CheckoutRequest},
    entity::{
        OrderStatus, PaymentMethod, products::ActiveModel as ProductActive,
        users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::AuthUser,
    pricing::PricingConfig,
    routes::admin::{LowStockQuery, StatusUpdateRequest, StockAdjustment},
    routes::params::{OrderListQuery, Pagination},
    services::{admin_service, cart_service, order_service, product_service},
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

// Each test seeds its own users and products with unique names, so the
// suite can run in parallel against one database without cleanup between
// tests.
async fn test_state() -> anyhow::Result<Option<AppState>> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(None);
            }
        };

    let pool = create_pool(&database_url, 5_000).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(Some(AppState {
        orm: orm_from_pool(&pool),
        pool,
        pricing: PricingConfig {
            shipping_flat_cost: 15_000,
            tax_rate_bps: 1_000,
        },
    }))
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

async fn create_user(state: &AppState, role: &str) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(format!("{}@example.com", unique(role))),
        password_hash: Set("dummy".into()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role: role.into(),
    })
}

async fn create_product(state: &AppState, unit_price: i64, stock: i32) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(unique("Test Grocery")),
        description: Set(Some("A product for testing".into())),
        unit_price: Set(unit_price),
        stock: Set(stock),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(product.id)
}

async fn add_line(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    quantity: i32,
) -> anyhow::Result<Uuid> {
    let resp = cart_service::add_to_cart(state, user, AddToCartRequest { product_id, quantity })
        .await
        .map_err(|e| anyhow::anyhow!("add_to_cart failed: {e}"))?;
    Ok(resp.data.expect("cart line").id)
}

async fn product_stock(state: &AppState, id: Uuid) -> anyhow::Result<i32> {
    let resp = product_service::get_product(state, id)
        .await
        .map_err(|e| anyhow::anyhow!("get_product failed: {e}"))?;
    Ok(resp.data.expect("product").stock)
}

fn checkout_request() -> CheckoutRequest {
    CheckoutRequest {
        shipping_address: "12 Market Street".into(),
        payment_method: "bank_transfer".into(),
        notes: None,
        cart_line_ids: None,
    }
}

fn default_order_query() -> OrderListQuery {
    OrderListQuery {
        pagination: Pagination {
            page: None,
            per_page: None,
        },
        status: None,
        sort_order: None,
    }
}

#[tokio::test]
async fn checkout_prices_the_cart_and_decrements_stock() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let user = create_user(&state, "user").await?;
    let product_a = create_product(&state, 50_000, 10).await?;
    let product_b = create_product(&state, 30_000, 5).await?;

    add_line(&state, &user, product_a, 2).await?;
    add_line(&state, &user, product_b, 1).await?;

    let resp = order_service::checkout(&state, &user, checkout_request())
        .await
        .map_err(|e| anyhow::anyhow!("checkout failed: {e}"))?;
    let data = resp.data.expect("order with lines");

    assert_eq!(data.order.subtotal, 130_000);
    assert_eq!(data.order.shipping_cost, 15_000);
    assert_eq!(data.order.tax_amount, 13_000);
    assert_eq!(data.order.total_amount, 158_000);
    assert_eq!(data.order.status, OrderStatus::Pending);
    assert_eq!(data.order.payment_method, PaymentMethod::BankTransfer);
    assert!(data.order.order_number.starts_with("ORD-"));
    assert_eq!(data.lines.len(), 2);

    let line_a = data
        .lines
        .iter()
        .find(|i| i.product_id == product_a)
        .expect("line for product a");
    assert_eq!(line_a.quantity, 2);
    assert_eq!(line_a.unit_price, 50_000);

    assert_eq!(product_stock(&state, product_a).await?, 8);
    assert_eq!(product_stock(&state, product_b).await?, 4);

    let cart = cart_service::list_cart(
        &state,
        &user,
        Pagination {
            page: None,
            per_page: None,
        },
    )
    .await
    .map_err(|e| anyhow::anyhow!("list_cart failed: {e}"))?;
    assert!(cart.data.expect("cart").lines.is_empty(), "cart not cleared");

    // The stored order reads back exactly as it was returned.
    let fetched = order_service::get_order(&state, &user, data.order.id)
        .await
        .map_err(|e| anyhow::anyhow!("get_order failed: {e}"))?;
    let fetched = fetched.data.expect("fetched order");
    assert_eq!(fetched.order.order_number, data.order.order_number);
    assert_eq!(fetched.order.total_amount, 158_000);
    assert_eq!(fetched.lines.len(), 2);

    Ok(())
}

#[tokio::test]
async fn checkout_with_empty_cart_is_rejected() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let user = create_user(&state, "user").await?;

    match order_service::checkout(&state, &user, checkout_request()).await {
        Err(AppError::EmptyCart) => {}
        Err(other) => panic!("expected EmptyCart, got error: {other}"),
        Ok(_) => panic!("expected EmptyCart, got an order"),
    }

    Ok(())
}

#[tokio::test]
async fn stock_shortages_abort_the_whole_checkout() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let user = create_user(&state, "user").await?;
    let scarce = create_product(&state, 10_000, 1).await?;
    let plenty = create_product(&state, 20_000, 5).await?;

    add_line(&state, &user, scarce, 3).await?;
    add_line(&state, &user, plenty, 2).await?;

    match order_service::checkout(&state, &user, checkout_request()).await {
        Err(AppError::InsufficientStock(shortages)) => {
            assert_eq!(shortages.len(), 1);
            assert_eq!(shortages[0].product_id, scarce);
            assert_eq!(shortages[0].requested, 3);
            assert_eq!(shortages[0].available, 1);
        }
        Err(other) => panic!("expected InsufficientStock, got error: {other}"),
        Ok(_) => panic!("expected InsufficientStock, got an order"),
    }

    // Nothing moved: stock intact, cart intact, no order recorded.
    assert_eq!(product_stock(&state, scarce).await?, 1);
    assert_eq!(product_stock(&state, plenty).await?, 5);

    let cart = cart_service::list_cart(
        &state,
        &user,
        Pagination {
            page: None,
            per_page: None,
        },
    )
    .await
    .map_err(|e| anyhow::anyhow!("list_cart failed: {e}"))?;
    assert_eq!(cart.data.expect("cart").lines.len(), 2);

    let orders = order_service::list_orders(&state, &user, default_order_query())
        .await
        .map_err(|e| anyhow::anyhow!("list_orders failed: {e}"))?;
    assert!(orders.data.expect("orders").items.is_empty());

    Ok(())
}

#[tokio::test]
async fn selected_lines_checkout_leaves_the_rest() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let user = create_user(&state, "user").await?;
    let wanted = create_product(&state, 15_000, 10).await?;
    let parked = create_product(&state, 25_000, 10).await?;

    let wanted_line = add_line(&state, &user, wanted, 1).await?;
    add_line(&state, &user, parked, 2).await?;

    let mut request = checkout_request();
    request.cart_line_ids = Some(vec![wanted_line]);

    let resp = order_service::checkout(&state, &user, request)
        .await
        .map_err(|e| anyhow::anyhow!("checkout failed: {e}"))?;
    let data = resp.data.expect("order with lines");

    assert_eq!(data.lines.len(), 1);
    assert_eq!(data.lines[0].product_id, wanted);
    assert_eq!(data.order.subtotal, 15_000);

    let cart = cart_service::list_cart(
        &state,
        &user,
        Pagination {
            page: None,
            per_page: None,
        },
    )
    .await
    .map_err(|e| anyhow::anyhow!("list_cart failed: {e}"))?;
    let remaining = cart.data.expect("cart").lines;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].product.id, parked);
    assert_eq!(remaining[0].quantity, 2);

    assert_eq!(product_stock(&state, wanted).await?, 9);
    assert_eq!(product_stock(&state, parked).await?, 10);

    Ok(())
}

#[tokio::test]
async fn checkout_cannot_spend_another_users_cart_lines() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let owner = create_user(&state, "user").await?;
    let stranger = create_user(&state, "user").await?;
    let product = create_product(&state, 22_000, 10).await?;
    let owners_line = add_line(&state, &owner, product, 3).await?;

    // Someone else's line id and a made-up id resolve to none of the
    // caller's lines, so the selection comes up empty.
    let mut request = checkout_request();
    request.cart_line_ids = Some(vec![owners_line, Uuid::new_v4()]);

    match order_service::checkout(&state, &stranger, request).await {
        Err(AppError::EmptyCart) => {}
        Err(other) => panic!("expected EmptyCart, got error: {other}"),
        Ok(_) => panic!("expected EmptyCart when no selected line belongs to the caller"),
    }

    // The owner's cart and the stock are untouched.
    assert_eq!(product_stock(&state, product).await?, 10);
    let cart = cart_service::list_cart(
        &state,
        &owner,
        Pagination {
            page: None,
            per_page: None,
        },
    )
    .await
    .map_err(|e| anyhow::anyhow!("list_cart failed: {e}"))?;
    let lines = cart.data.expect("cart").lines;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 3);

    Ok(())
}

#[tokio::test]
async fn adding_a_product_again_replaces_the_quantity() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let user = create_user(&state, "user").await?;
    let product = create_product(&state, 9_000, 10).await?;

    let first = add_line(&state, &user, product, 2).await?;
    let second = add_line(&state, &user, product, 5).await?;
    assert_eq!(first, second, "same line is kept");

    let cart = cart_service::list_cart(
        &state,
        &user,
        Pagination {
            page: None,
            per_page: None,
        },
    )
    .await
    .map_err(|e| anyhow::anyhow!("list_cart failed: {e}"))?;
    let lines = cart.data.expect("cart").lines;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 5, "quantity is replaced, not merged");

    Ok(())
}

#[tokio::test]
async fn order_lines_keep_the_price_paid() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let user = create_user(&state, "user").await?;
    let admin = create_user(&state, "admin").await?;
    let product = create_product(&state, 40_000, 10).await?;

    add_line(&state, &user, product, 1).await?;
    let resp = order_service::checkout(&state, &user, checkout_request())
        .await
        .map_err(|e| anyhow::anyhow!("checkout failed: {e}"))?;
    let order_id = resp.data.expect("order").order.id;

    product_service::update_product(
        &state,
        &admin,
        product,
        grocery_checkout_api::dto::products::UpdateProductRequest {
            name: None,
            description: None,
            unit_price: Some(99_000),
            stock: None,
        },
    )
    .await
    .map_err(|e| anyhow::anyhow!("update_product failed: {e}"))?;

    let fetched = order_service::get_order(&state, &user, order_id)
        .await
        .map_err(|e| anyhow::anyhow!("get_order failed: {e}"))?;
    let fetched = fetched.data.expect("order");
    assert_eq!(fetched.lines[0].unit_price, 40_000);
    assert_eq!(fetched.order.subtotal, 40_000);

    Ok(())
}

#[tokio::test]
async fn overflowing_totals_are_rejected_not_wrapped() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let user = create_user(&state, "user").await?;
    let product = create_product(&state, i64::MAX, 5).await?;
    add_line(&state, &user, product, 2).await?;

    match order_service::checkout(&state, &user, checkout_request()).await {
        Err(AppError::Validation(_)) => {}
        Err(other) => panic!("expected Validation, got error: {other}"),
        Ok(_) => panic!("expected Validation for a total beyond i64"),
    }

    // The failed attempt consumed nothing.
    assert_eq!(product_stock(&state, product).await?, 5);
    let cart = cart_service::list_cart(
        &state,
        &user,
        Pagination {
            page: None,
            per_page: None,
        },
    )
    .await
    .map_err(|e| anyhow::anyhow!("list_cart failed: {e}"))?;
    assert_eq!(cart.data.expect("cart").lines.len(), 1);

    Ok(())
}

#[tokio::test]
async fn consecutive_checkouts_get_distinct_order_numbers() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let user = create_user(&state, "user").await?;
    let product = create_product(&state, 12_000, 20).await?;

    add_line(&state, &user, product, 1).await?;
    let first = order_service::checkout(&state, &user, checkout_request())
        .await
        .map_err(|e| anyhow::anyhow!("first checkout failed: {e}"))?;

    add_line(&state, &user, product, 1).await?;
    let second = order_service::checkout(&state, &user, checkout_request())
        .await
        .map_err(|e| anyhow::anyhow!("second checkout failed: {e}"))?;

    let first = first.data.expect("first order").order.order_number;
    let second = second.data.expect("second order").order.order_number;
    assert_ne!(first, second);
    assert!(first.starts_with("ORD-"));
    assert!(second.starts_with("ORD-"));

    Ok(())
}

#[tokio::test]
async fn status_moves_only_along_the_lifecycle() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let user = create_user(&state, "user").await?;
    let admin = create_user(&state, "admin").await?;
    let product = create_product(&state, 18_000, 10).await?;

    add_line(&state, &user, product, 1).await?;
    let resp = order_service::checkout(&state, &user, checkout_request())
        .await
        .map_err(|e| anyhow::anyhow!("checkout failed: {e}"))?;
    let order_id = resp.data.expect("order").order.id;

    let set_status = |status: &str| StatusUpdateRequest {
        status: status.to_string(),
    };

    // Unknown status is rejected before we even look at the order.
    match admin_service::update_order_status(&state, &admin, order_id, set_status("paid")).await {
        Err(AppError::Validation(_)) => {}
        Err(other) => panic!("expected Validation, got error: {other}"),
        Ok(_) => panic!("expected Validation error for unknown status"),
    }

    // Skipping ahead from pending to shipped is illegal.
    match admin_service::update_order_status(&state, &admin, order_id, set_status("shipped")).await
    {
        Err(AppError::BadRequest(_)) => {}
        Err(other) => panic!("expected BadRequest, got error: {other}"),
        Ok(_) => panic!("expected BadRequest for illegal transition"),
    }

    let updated =
        admin_service::update_order_status(&state, &admin, order_id, set_status("processing"))
            .await
            .map_err(|e| anyhow::anyhow!("to processing failed: {e}"))?;
    assert_eq!(updated.data.expect("order").status, OrderStatus::Processing);

    let updated =
        admin_service::update_order_status(&state, &admin, order_id, set_status("shipped"))
            .await
            .map_err(|e| anyhow::anyhow!("to shipped failed: {e}"))?;
    assert_eq!(updated.data.expect("order").status, OrderStatus::Shipped);

    // Shipped orders can no longer be cancelled.
    match admin_service::update_order_status(&state, &admin, order_id, set_status("cancelled"))
        .await
    {
        Err(AppError::BadRequest(_)) => {}
        Err(other) => panic!("expected BadRequest, got error: {other}"),
        Ok(_) => panic!("expected BadRequest when cancelling a shipped order"),
    }

    let updated =
        admin_service::update_order_status(&state, &admin, order_id, set_status("delivered"))
            .await
            .map_err(|e| anyhow::anyhow!("to delivered failed: {e}"))?;
    assert_eq!(updated.data.expect("order").status, OrderStatus::Delivered);

    // Delivered is terminal.
    match admin_service::update_order_status(&state, &admin, order_id, set_status("processing"))
        .await
    {
        Err(AppError::BadRequest(_)) => {}
        Err(other) => panic!("expected BadRequest, got error: {other}"),
        Ok(_) => panic!("expected BadRequest when reopening a delivered order"),
    }

    Ok(())
}

#[tokio::test]
async fn restocking_requires_a_sane_delta() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let admin = create_user(&state, "admin").await?;
    let product = create_product(&state, 60_000, 2).await?;

    match admin_service::adjust_inventory(
        &state,
        &admin,
        product,
        StockAdjustment { delta: -5 },
    )
    .await
    {
        Err(AppError::BadRequest(_)) => {}
        Err(other) => panic!("expected BadRequest, got error: {other}"),
        Ok(_) => panic!("expected BadRequest for negative stock"),
    }

    match admin_service::adjust_inventory(
        &state,
        &admin,
        product,
        StockAdjustment { delta: 0 },
    )
    .await
    {
        Err(AppError::Validation(_)) => {}
        Err(other) => panic!("expected Validation, got error: {other}"),
        Ok(_) => panic!("expected Validation error for zero delta"),
    }

    let updated = admin_service::adjust_inventory(
        &state,
        &admin,
        product,
        StockAdjustment { delta: 10 },
    )
    .await
    .map_err(|e| anyhow::anyhow!("adjust_inventory failed: {e}"))?;
    assert_eq!(updated.data.expect("product").stock, 12);

    let low = admin_service::list_low_stock(
        &state,
        &admin,
        LowStockQuery {
            pagination: Pagination {
                page: Some(1),
                per_page: Some(100),
            },
            threshold: Some(20),
        },
    )
    .await
    .map_err(|e| anyhow::anyhow!("list_low_stock failed: {e}"))?;
    assert!(
        low.data
            .expect("low stock")
            .items
            .iter()
            .any(|p| p.id == product),
        "expected product to appear in low-stock list"
    );

    Ok(())
}

#[tokio::test]
async fn non_admins_are_locked_out_of_admin_surface() -> anyhow::Result<()> {
    let Some(state) = test_state().await? else {
        return Ok(());
    };

    let user = create_user(&state, "user").await?;
    let product = create_product(&state, 10_000, 5).await?;

    match admin_service::list_all_orders(&state, &user, default_order_query()).await {
        Err(AppError::Forbidden) => {}
        Err(other) => panic!("expected Forbidden, got error: {other}"),
        Ok(_) => panic!("expected Forbidden"),
    }

    match admin_service::adjust_inventory(
        &state,
        &user,
        product,
        StockAdjustment { delta: 1 },
    )
    .await
    {
        Err(AppError::Forbidden) => {}
        Err(other) => panic!("expected Forbidden, got error: {other}"),
        Ok(_) => panic!("expected Forbidden"),
    }

    Ok(())
}
