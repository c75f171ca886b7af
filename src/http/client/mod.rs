pub mod hyper_client;
