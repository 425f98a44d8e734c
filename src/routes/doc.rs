use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{AddCartItemRequest, CartConflict, CartMutation, SetCartItemQtyRequest},
        orders::{
            AdminOrderAction, AdminOrderActionRequest, CancelOrderRequest, CheckoutResult,
            DeliveryDetailsRequest, OrderDetail, OrderList, OrderTimeline, PickupDetailsRequest,
        },
        payments::{CreatePaymentIntentRequest, PaymentIntent},
    },
    error::StockShortage,
    models::{
        CartLine, CartSnapshot, DeliveryAddress, Fulfillment, FulfillmentType, Order, OrderEvent,
        OrderItem, OrderStatus, Payment, PaymentStatus, PickupSlot,
    },
    response::{ApiResponse, Meta},
    routes::{admin, cart, checkout, health, orders, params, payments},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        cart::get_cart,
        cart::add_item,
        cart::clear_cart,
        cart::set_item_qty,
        cart::remove_item,
        checkout::start_checkout,
        checkout::set_delivery_details,
        checkout::set_pickup_details,
        payments::create_intent,
        payments::payment_webhook,
        orders::list_orders,
        orders::get_order,
        orders::get_order_events,
        orders::cancel_order,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::order_action
    ),
    components(
        schemas(
            OrderStatus,
            PaymentStatus,
            FulfillmentType,
            DeliveryAddress,
            PickupSlot,
            Fulfillment,
            Order,
            OrderItem,
            Payment,
            OrderEvent,
            CartLine,
            CartSnapshot,
            StockShortage,
            AddCartItemRequest,
            SetCartItemQtyRequest,
            CartConflict,
            CartMutation,
            CheckoutResult,
            DeliveryDetailsRequest,
            PickupDetailsRequest,
            CancelOrderRequest,
            AdminOrderAction,
            AdminOrderActionRequest,
            OrderDetail,
            OrderList,
            OrderTimeline,
            CreatePaymentIntentRequest,
            PaymentIntent,
            params::Pagination,
            params::SortOrder,
            params::OrderListQuery,
            health::HealthData,
            Meta,
            ApiResponse<CartSnapshot>,
            ApiResponse<CartMutation>,
            ApiResponse<CheckoutResult>,
            ApiResponse<OrderDetail>,
            ApiResponse<OrderList>,
            ApiResponse<PaymentIntent>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Checkout", description = "Checkout and fulfillment endpoints"),
        (name = "Payments", description = "Payment intent and confirmation endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/cart",
            "/api/cart/items/{item_id}",
            "/api/checkout/start",
            "/api/checkout/delivery",
            "/api/checkout/pickup",
            "/api/payments/intent",
            "/api/payments/webhook",
            "/api/orders",
            "/api/orders/{id}",
            "/api/orders/{id}/events",
            "/api/orders/{id}/cancel",
            "/api/admin/orders",
            "/api/admin/orders/{id}",
            "/api/admin/orders/{id}/actions",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }
    }

    #[test]
    fn webhook_documents_raw_json_body() {
        let doc = ApiDoc::openapi();
        let webhook = doc
            .paths
            .paths
            .get("/api/payments/webhook")
            .and_then(|item| item.post.as_ref())
            .expect("webhook operation");
        let body = webhook.request_body.as_ref().expect("request body");
        assert!(body.content.contains_key("application/json"));
    }
}
