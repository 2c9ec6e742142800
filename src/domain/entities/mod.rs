pub mod account;
pub mod billing_event;
pub mod plan;
pub mod role;
pub mod subscription_status;
