//! Unit tests for single-attempt address resolution.

use rstest::{fixture, rstest};

use super::*;
use crate::launch::{LaunchConfigInput, validate};
use crate::provider::AddressRecord;
use crate::template::TemplateContext;
use crate::test_support::{ProviderCall, ScriptedProvider};

fn launch_config(input: LaunchConfigInput) -> LaunchConfig {
    let base = LaunchConfigInput {
        source_image: String::from("ubuntu-22.04"),
        flavor: String::from("m1.small"),
        ..input
    };
    validate(&base, &TemplateContext::new())
        .into_result()
        .unwrap_or_else(|err| panic!("fixture config should validate: {err}"))
}

#[fixture]
fn config() -> LaunchConfig {
    launch_config(LaunchConfigInput::default())
}

#[fixture]
fn floating_config() -> LaunchConfig {
    launch_config(LaunchConfigInput {
        use_floating_ip: true,
        ..LaunchConfigInput::default()
    })
}

#[fixture]
fn provider() -> ScriptedProvider {
    ScriptedProvider::new()
}

#[rstest]
#[tokio::test]
async fn preferred_pool_address_is_returned_without_provider_calls(
    config: LaunchConfig,
    provider: ScriptedProvider,
) {
    let instance = InstanceHandle::new("srv-1")
        .with_pool("private", [AddressRecord::new("192.168.0.4")])
        .with_pool("public", [AddressRecord::new("10.0.0.5")]);
    let mut state = PipelineState::with_instance(instance);

    let address = AddressResolver::default()
        .resolve(&mut state, &config, &provider)
        .await
        .unwrap_or_else(|err| panic!("address should resolve: {err}"));

    assert_eq!(address, ResolvedAddress::new("10.0.0.5", 22));
    assert_eq!(address.to_string(), "10.0.0.5:22");
    assert!(provider.calls().is_empty());
    assert_eq!(state.resolved_address(), Some(&address));
}

#[rstest]
#[tokio::test]
async fn empty_address_strings_are_not_usable(config: LaunchConfig, provider: ScriptedProvider) {
    let instance = InstanceHandle::new("srv-1")
        .with_pool("public", [AddressRecord::new("")])
        .with_pool("private", [AddressRecord::new("  "), AddressRecord::new("192.168.0.4")]);
    let mut state = PipelineState::with_instance(instance);

    let address = AddressResolver::default()
        .resolve(&mut state, &config, &provider)
        .await
        .unwrap_or_else(|err| panic!("address should resolve: {err}"));

    assert_eq!(address.host(), "192.168.0.4");
}

#[rstest]
#[tokio::test]
async fn unlisted_pools_are_searched_in_name_order(config: LaunchConfig, provider: ScriptedProvider) {
    let instance = InstanceHandle::new("srv-1")
        .with_pool("zeta", [AddressRecord::new("172.16.0.9")])
        .with_pool("alpha", [AddressRecord::new("172.16.0.1")]);
    let mut state = PipelineState::with_instance(instance);

    let address = AddressResolver::default()
        .resolve(&mut state, &config, &provider)
        .await
        .unwrap_or_else(|err| panic!("address should resolve: {err}"));

    assert_eq!(address.host(), "172.16.0.1");
}

#[rstest]
#[tokio::test]
async fn configured_preference_overrides_default(config: LaunchConfig, provider: ScriptedProvider) {
    let instance = InstanceHandle::new("srv-1")
        .with_pool("public", [AddressRecord::new("10.0.0.5")])
        .with_pool("tenant-net", [AddressRecord::new("192.168.7.7")]);
    let mut state = PipelineState::with_instance(instance);
    let resolver = AddressResolver::new(PoolPreference::parse("tenant-net, public"));

    let address = resolver
        .resolve(&mut state, &config, &provider)
        .await
        .unwrap_or_else(|err| panic!("address should resolve: {err}"));

    assert_eq!(address.host(), "192.168.7.7");
}

#[rstest]
#[tokio::test]
async fn empty_pools_trigger_one_refresh_and_retryable_error(
    config: LaunchConfig,
    provider: ScriptedProvider,
) {
    let refreshed = InstanceHandle::new("srv-1")
        .with_status("ACTIVE")
        .with_pool("public", [AddressRecord::new("10.0.0.5")]);
    provider.push_snapshot(refreshed.clone());
    let mut state = PipelineState::with_instance(InstanceHandle::new("srv-1").with_status("BUILD"));
    let resolver = AddressResolver::default();

    let err = resolver
        .resolve(&mut state, &config, &provider)
        .await
        .expect_err("no address yet");

    assert!(err.is_retryable(), "unexpected error: {err}");
    assert!(matches!(err, AddressError::NotYetAvailable { ref instance_id } if instance_id == "srv-1"));
    assert_eq!(provider.calls(), vec![ProviderCall::InstanceById(String::from("srv-1"))]);
    assert_eq!(state.instance(), Some(&refreshed));
    assert_eq!(state.resolved_address(), None);

    let address = resolver
        .resolve(&mut state, &config, &provider)
        .await
        .unwrap_or_else(|error| panic!("refreshed snapshot should resolve: {error}"));
    assert_eq!(address, ResolvedAddress::new("10.0.0.5", 22));
    assert_eq!(provider.calls().len(), 1);
}

#[rstest]
#[tokio::test]
async fn refresh_failure_is_fatal(config: LaunchConfig, provider: ScriptedProvider) {
    provider.push_snapshot_failure("compute API unavailable");
    let original = InstanceHandle::new("srv-1");
    let mut state = PipelineState::with_instance(original.clone());

    let err = AddressResolver::default()
        .resolve(&mut state, &config, &provider)
        .await
        .expect_err("refresh should fail");

    assert!(!err.is_retryable());
    assert!(matches!(err, AddressError::ProviderQuery { .. }), "unexpected error: {err}");
    assert_eq!(state.instance(), Some(&original));
}

#[rstest]
#[tokio::test]
async fn floating_ip_is_allocated_from_pool_and_returned_immediately(
    floating_config: LaunchConfig,
    provider: ScriptedProvider,
) {
    provider.push_association("203.0.113.20");
    let instance = InstanceHandle::new("srv-1").with_pool("private", [AddressRecord::new("192.168.0.4")]);
    let mut state = PipelineState::with_instance(instance);

    let address = AddressResolver::default()
        .resolve(&mut state, &floating_config, &provider)
        .await
        .unwrap_or_else(|err| panic!("floating IP should resolve: {err}"));

    assert_eq!(address, ResolvedAddress::new("203.0.113.20", 22));
    assert_eq!(
        provider.calls(),
        vec![ProviderCall::AssociateFloatingIp {
            instance_id: String::from("srv-1"),
            target: FloatingIpTarget::Pool(String::from("public")),
        }]
    );
    assert_eq!(state.floating_ip(), Some("203.0.113.20"));
}

#[rstest]
#[tokio::test]
async fn explicit_floating_ip_skips_pool_allocation(provider: ScriptedProvider) {
    let config = launch_config(LaunchConfigInput {
        use_floating_ip: true,
        floating_ip: String::from("203.0.113.77"),
        ssh_port: 2222,
        ..LaunchConfigInput::default()
    });
    provider.push_association("203.0.113.77");
    let mut state = PipelineState::with_instance(InstanceHandle::new("srv-1"));

    let address = AddressResolver::default()
        .resolve(&mut state, &config, &provider)
        .await
        .unwrap_or_else(|err| panic!("floating IP should resolve: {err}"));

    assert_eq!(address.to_string(), "203.0.113.77:2222");
    assert!(matches!(
        provider.calls().first(),
        Some(ProviderCall::AssociateFloatingIp { target: FloatingIpTarget::Address(ip), .. }) if ip == "203.0.113.77"
    ));
}

#[rstest]
#[tokio::test]
async fn association_failure_is_fatal(floating_config: LaunchConfig, provider: ScriptedProvider) {
    provider.push_association_failure("quota exceeded");
    let mut state = PipelineState::with_instance(InstanceHandle::new("srv-1"));

    let err = AddressResolver::default()
        .resolve(&mut state, &floating_config, &provider)
        .await
        .expect_err("association should fail");

    assert!(matches!(err, AddressError::AllocationFailed { .. }), "unexpected error: {err}");
    assert!(!err.is_retryable());
    assert_eq!(state.floating_ip(), None);
    assert_eq!(provider.calls().len(), 1);
}

#[rstest]
#[tokio::test]
async fn associated_floating_ip_is_not_associated_twice(
    floating_config: LaunchConfig,
    provider: ScriptedProvider,
) {
    provider.push_association("203.0.113.20");
    let mut state = PipelineState::with_instance(
        InstanceHandle::new("srv-1").with_pool("private", [AddressRecord::new("192.168.0.4")]),
    );
    let resolver = AddressResolver::default();

    resolver
        .resolve(&mut state, &floating_config, &provider)
        .await
        .unwrap_or_else(|err| panic!("first attempt: {err}"));
    let second = resolver
        .resolve(&mut state, &floating_config, &provider)
        .await
        .unwrap_or_else(|err| panic!("second attempt: {err}"));

    assert_eq!(second.host(), "203.0.113.20");
    assert_eq!(provider.calls().len(), 1);
}

#[rstest]
#[tokio::test]
async fn missing_instance_is_reported(config: LaunchConfig, provider: ScriptedProvider) {
    let mut state = PipelineState::new();

    let err = AddressResolver::default()
        .resolve(&mut state, &config, &provider)
        .await
        .expect_err("no instance to resolve");

    assert!(matches!(err, AddressError::MissingInstance));
    assert!(provider.calls().is_empty());
}

#[test]
fn ipv6_hosts_are_bracketed() {
    assert_eq!(
        ResolvedAddress::new("2001:db8::5", 22).to_string(),
        "[2001:db8::5]:22"
    );
}

#[test]
fn pool_preference_parsing_skips_blanks() {
    let preference = PoolPreference::parse(" public, ,private ,");
    assert_eq!(preference.pools(), ["public", "private"]);
}
