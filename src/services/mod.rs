pub mod conversation;
pub mod proxy_client;
