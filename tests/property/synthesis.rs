// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Deterministic Synthesis
//!
//! Synthesizing the same configuration twice must produce byte-identical
//! artifacts, and every synthesized app must satisfy its own wiring checks.

use proptest::prelude::*;

use gateway_infra::plan::plan_stack;
use gateway_infra::{compose, DeploymentConfig};

use crate::fixtures::targeted_config;

prop_compose! {
    fn arb_config()(
        project in "[a-z][a-z0-9]{0,7}(-[a-z0-9]{1,4})?",
        zones in 2usize..=4,
        nat_ratio in 0usize..4,
        subnet_prefix in 20u8..=22,
        interface_endpoints in any::<bool>(),
        retain_images in 1u32..=50,
        log_retention_days in 1u32..=90,
        desired_count in 1u32..=4,
        with_mounts in any::<bool>(),
        multi_az in any::<bool>(),
    ) -> DeploymentConfig {
        let mut config = targeted_config();
        config.project = project;
        config.network.availability_zones = zones;
        config.network.nat_gateways = 1 + nat_ratio % zones;
        config.network.subnet_prefix = subnet_prefix;
        config.network.interface_endpoints = interface_endpoints;
        config.registry.retain_images = retain_images;
        config.log_retention_days = log_retention_days;
        config.database.multi_az = multi_az;
        for service in &mut config.services {
            service.desired_count = desired_count;
            if !with_mounts {
                service.mounts.clear();
            }
        }
        config
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Two independent syntheses render identical files
    #[test]
    fn prop_synthesis_is_deterministic(config in arb_config()) {
        let first = compose(&config).unwrap().synth().unwrap().files().unwrap();
        let second = compose(&config).unwrap().synth().unwrap().files().unwrap();
        prop_assert_eq!(first, second);
    }

    /// Re-planning a synthesized template against itself finds nothing to do
    #[test]
    fn prop_resynthesis_plans_no_changes(config in arb_config()) {
        let first = compose(&config).unwrap().synth().unwrap();
        let second = compose(&config).unwrap().synth().unwrap();
        for (applied, desired) in first.stacks.iter().zip(&second.stacks) {
            let plan = plan_stack(&desired.name, Some(&applied.template), &desired.template);
            prop_assert!(plan.is_empty(), "{}", plan.summary());
        }
    }

    /// Generated apps pass validation and every import names a dependency
    #[test]
    fn prop_imports_covered_by_dependencies(config in arb_config()) {
        let app = compose(&config).unwrap();
        app.validate().unwrap();
        for stack in app.stacks() {
            for import in stack.imports() {
                prop_assert!(stack.dependencies().contains(import.producer()));
                prop_assert!(import.export().as_str().starts_with(&config.project));
            }
        }
    }
}
