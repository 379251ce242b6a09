//! Unit tests module

mod cluster_test;
mod config_test;
mod connectivity_test;
mod error_test;
mod health_test;
mod ingress_test;
mod logs_test;
mod network_policy_test;
mod output_test;
mod request_path_test;
mod resources_test;
mod server_test;
mod tools_test;
mod topology_test;
mod workload_test;
