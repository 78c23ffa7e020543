//! IBM Cloud REST API Client
//!
//! A Rust client library for the IBM Cloud APIs the Cluster API provider
//! drives: VPC (generation 2), Power Virtual Server and the Resource
//! Controller. Every request is authenticated with an IAM bearer token
//! exchanged from an API key.
//!
//! # Example
//!
//! ```no_run
//! use ibmcloud_client::{ClientProvider, IbmCloudClientProvider, ServiceEndpoints};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = IbmCloudClientProvider::new(
//!     "your-api-key".to_string(),
//!     "https://iam.cloud.ibm.com".to_string(),
//!     ServiceEndpoints::default(),
//! )?;
//!
//! // VPC clients are regional
//! let vpc = provider.vpc("us-south").await?;
//! let vpcs = vpc.list_vpcs(None).await?;
//!
//! // PowerVS clients are bound to one workspace
//! let power = provider.power_vs("0a1b2c3d-service-instance-guid").await?;
//! let images = power.list_images().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **IAM authentication**: token exchange with caching and early refresh
//! - **VPC operations**: VPCs, subnets, public gateways, floating IPs,
//!   security group rules, instances and load balancers
//! - **PowerVS operations**: instances, images, COS image import jobs, networks
//! - **Pagination**: VPC list calls follow `next.href` until exhausted
//! - **Endpoint overrides**: per-region service URLs for private endpoints

pub mod auth;
pub mod client;
pub mod common;
pub mod endpoints;
pub mod error;
pub mod models;
pub mod provider;
#[path = "trait.rs"]
pub mod client_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use auth::IamAuthenticator;
pub use client::{PowerVsClient, ResourceControllerClient, VpcClient};
pub use client_trait::{PowerVsClientTrait, VpcClientTrait};
pub use common::HttpClient;
pub use endpoints::{region_for_zone, ServiceEndpoints};
pub use error::IbmCloudError;
pub use models::*;
pub use provider::{ClientProvider, IbmCloudClientProvider};
#[cfg(feature = "test-util")]
pub use mock::{MockClientProvider, MockPowerVsClient, MockVpcClient};
