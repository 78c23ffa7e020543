//! VPC API client
//!
//! Implements the VPC generation 2 REST API for the resources the cluster and
//! machine reconcilers manage.

use crate::auth::IamAuthenticator;
use crate::common::query::fetch_all_pages;
use crate::common::{build_query_string, HttpClient};
use crate::client_trait::VpcClientTrait;
use crate::error::IbmCloudError;
use crate::models::*;
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

/// API version date sent with every VPC request
pub const VPC_API_VERSION: &str = "2024-04-30";

/// VPC API client bound to one region
pub struct VpcClient {
    http: HttpClient,
    region: String,
}

impl VpcClient {
    /// Create a new VPC client
    ///
    /// # Arguments
    /// * `client` - Shared HTTP client
    /// * `auth` - IAM authenticator
    /// * `region` - VPC region (e.g. "us-south")
    /// * `base_url` - API base URL (e.g. "https://us-south.iaas.cloud.ibm.com/v1")
    pub fn new(client: Client, auth: Arc<IamAuthenticator>, region: String, base_url: String) -> Self {
        let http = HttpClient::new(client, base_url, auth)
            .with_query("version", VPC_API_VERSION)
            .with_query("generation", "2");
        Self { http, region }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }
}

fn with_filters(path: &str, filters: &[(&str, &str)]) -> String {
    if filters.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, build_query_string(filters))
    }
}

fn resource_group_filter(resource_group_id: Option<&str>) -> Vec<(&str, &str)> {
    resource_group_id
        .map(|id| vec![("resource_group.id", id)])
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl VpcClientTrait for VpcClient {
    fn region(&self) -> &str {
        &self.region
    }

    async fn list_vpcs(&self, resource_group_id: Option<&str>) -> Result<Vec<Vpc>, IbmCloudError> {
        let path = with_filters("/vpcs", &resource_group_filter(resource_group_id));
        fetch_all_pages(&self.http, &path, "vpcs").await
    }

    async fn get_vpc(&self, id: &str) -> Result<Vpc, IbmCloudError> {
        self.http.get(&format!("/vpcs/{}", id)).await
    }

    async fn create_vpc(&self, prototype: &VpcPrototype) -> Result<Vpc, IbmCloudError> {
        debug!("Creating VPC {}", prototype.name);
        self.http.post("/vpcs", &serde_json::to_value(prototype)?).await
    }

    async fn delete_vpc(&self, id: &str) -> Result<(), IbmCloudError> {
        self.http.delete(&format!("/vpcs/{}", id)).await
    }

    async fn list_vpc_address_prefixes(&self, vpc_id: &str) -> Result<Vec<AddressPrefix>, IbmCloudError> {
        fetch_all_pages(&self.http, &format!("/vpcs/{}/address_prefixes", vpc_id), "address_prefixes").await
    }

    async fn create_security_group_rule(
        &self,
        security_group_id: &str,
        prototype: &SecurityGroupRulePrototype,
    ) -> Result<SecurityGroupRule, IbmCloudError> {
        self.http
            .post(
                &format!("/security_groups/{}/rules", security_group_id),
                &serde_json::to_value(prototype)?,
            )
            .await
    }

    async fn list_security_group_rules(&self, security_group_id: &str) -> Result<Vec<SecurityGroupRule>, IbmCloudError> {
        fetch_all_pages(&self.http, &format!("/security_groups/{}/rules", security_group_id), "rules").await
    }

    async fn list_subnets(&self, resource_group_id: Option<&str>) -> Result<Vec<Subnet>, IbmCloudError> {
        let path = with_filters("/subnets", &resource_group_filter(resource_group_id));
        fetch_all_pages(&self.http, &path, "subnets").await
    }

    async fn get_subnet(&self, id: &str) -> Result<Subnet, IbmCloudError> {
        self.http.get(&format!("/subnets/{}", id)).await
    }

    async fn create_subnet(&self, prototype: &SubnetPrototype) -> Result<Subnet, IbmCloudError> {
        debug!("Creating subnet {} ({})", prototype.name, prototype.ipv4_cidr_block);
        self.http.post("/subnets", &serde_json::to_value(prototype)?).await
    }

    async fn delete_subnet(&self, id: &str) -> Result<(), IbmCloudError> {
        self.http.delete(&format!("/subnets/{}", id)).await
    }

    async fn get_subnet_public_gateway(&self, subnet_id: &str) -> Result<Option<PublicGateway>, IbmCloudError> {
        match self.http.get(&format!("/subnets/{}/public_gateway", subnet_id)).await {
            Ok(gateway) => Ok(Some(gateway)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn set_subnet_public_gateway(
        &self,
        subnet_id: &str,
        public_gateway_id: &str,
    ) -> Result<PublicGateway, IbmCloudError> {
        self.http
            .put(
                &format!("/subnets/{}/public_gateway", subnet_id),
                &serde_json::json!({ "id": public_gateway_id }),
            )
            .await
    }

    async fn unset_subnet_public_gateway(&self, subnet_id: &str) -> Result<(), IbmCloudError> {
        self.http.delete(&format!("/subnets/{}/public_gateway", subnet_id)).await
    }

    async fn list_public_gateways(&self) -> Result<Vec<PublicGateway>, IbmCloudError> {
        fetch_all_pages(&self.http, "/public_gateways", "public_gateways").await
    }

    async fn create_public_gateway(&self, prototype: &PublicGatewayPrototype) -> Result<PublicGateway, IbmCloudError> {
        self.http.post("/public_gateways", &serde_json::to_value(prototype)?).await
    }

    async fn delete_public_gateway(&self, id: &str) -> Result<(), IbmCloudError> {
        self.http.delete(&format!("/public_gateways/{}", id)).await
    }

    async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>, IbmCloudError> {
        fetch_all_pages(&self.http, "/floating_ips", "floating_ips").await
    }

    async fn create_floating_ip(&self, prototype: &FloatingIpPrototype) -> Result<FloatingIp, IbmCloudError> {
        self.http.post("/floating_ips", &serde_json::to_value(prototype)?).await
    }

    async fn get_floating_ip(&self, id: &str) -> Result<FloatingIp, IbmCloudError> {
        self.http.get(&format!("/floating_ips/{}", id)).await
    }

    async fn delete_floating_ip(&self, id: &str) -> Result<(), IbmCloudError> {
        self.http.delete(&format!("/floating_ips/{}", id)).await
    }

    async fn list_instances(&self, vpc_id: Option<&str>) -> Result<Vec<Instance>, IbmCloudError> {
        let filters: Vec<(&str, &str)> = vpc_id.map(|id| vec![("vpc.id", id)]).unwrap_or_default();
        fetch_all_pages(&self.http, &with_filters("/instances", &filters), "instances").await
    }

    async fn get_instance(&self, id: &str) -> Result<Instance, IbmCloudError> {
        self.http.get(&format!("/instances/{}", id)).await
    }

    async fn create_instance(&self, prototype: &InstancePrototype) -> Result<Instance, IbmCloudError> {
        debug!("Creating instance {} ({})", prototype.name, prototype.profile.name);
        self.http.post("/instances", &serde_json::to_value(prototype)?).await
    }

    async fn delete_instance(&self, id: &str) -> Result<(), IbmCloudError> {
        self.http.delete(&format!("/instances/{}", id)).await
    }

    async fn add_instance_network_interface_floating_ip(
        &self,
        instance_id: &str,
        network_interface_id: &str,
        floating_ip_id: &str,
    ) -> Result<FloatingIp, IbmCloudError> {
        debug!(
            "Binding floating IP {} to interface {} of instance {}",
            floating_ip_id, network_interface_id, instance_id
        );
        self.http
            .put(
                &format!(
                    "/instances/{}/network_interfaces/{}/floating_ips/{}",
                    instance_id, network_interface_id, floating_ip_id
                ),
                &serde_json::json!({}),
            )
            .await
    }

    async fn list_load_balancers(&self) -> Result<Vec<LoadBalancer>, IbmCloudError> {
        fetch_all_pages(&self.http, "/load_balancers", "load_balancers").await
    }

    async fn get_load_balancer(&self, id: &str) -> Result<LoadBalancer, IbmCloudError> {
        self.http.get(&format!("/load_balancers/{}", id)).await
    }

    async fn create_load_balancer(&self, prototype: &LoadBalancerPrototype) -> Result<LoadBalancer, IbmCloudError> {
        debug!("Creating load balancer {}", prototype.name);
        self.http.post("/load_balancers", &serde_json::to_value(prototype)?).await
    }

    async fn delete_load_balancer(&self, id: &str) -> Result<(), IbmCloudError> {
        self.http.delete(&format!("/load_balancers/{}", id)).await
    }

    async fn list_load_balancer_pool_members(
        &self,
        load_balancer_id: &str,
        pool_id: &str,
    ) -> Result<Vec<LoadBalancerPoolMember>, IbmCloudError> {
        fetch_all_pages(
            &self.http,
            &format!("/load_balancers/{}/pools/{}/members", load_balancer_id, pool_id),
            "members",
        )
        .await
    }

    async fn create_load_balancer_pool_member(
        &self,
        load_balancer_id: &str,
        pool_id: &str,
        prototype: &LoadBalancerPoolMemberPrototype,
    ) -> Result<LoadBalancerPoolMember, IbmCloudError> {
        self.http
            .post(
                &format!("/load_balancers/{}/pools/{}/members", load_balancer_id, pool_id),
                &serde_json::to_value(prototype)?,
            )
            .await
    }

    async fn delete_load_balancer_pool_member(
        &self,
        load_balancer_id: &str,
        pool_id: &str,
        member_id: &str,
    ) -> Result<(), IbmCloudError> {
        self.http
            .delete(&format!(
                "/load_balancers/{}/pools/{}/members/{}",
                load_balancer_id, pool_id, member_id
            ))
            .await
    }
}
