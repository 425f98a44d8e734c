pub mod admin_service;
pub mod cart_service;
pub mod checkout_service;
pub mod inventory;
pub mod order_service;
pub mod payment_service;
