// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Subnet Partitioning

use proptest::prelude::*;
use std::net::Ipv4Addr;

use gateway_infra::domain::{Ipv4Cidr, SubnetLayout, SubnetTier};

fn vpc_block() -> impl Strategy<Value = Ipv4Cidr> {
    (0u8..=255, 16u8..=20).prop_map(|(second, prefix)| {
        Ipv4Cidr::from_parts(Ipv4Addr::new(10, second, 0, 0), prefix).unwrap()
    })
}

proptest! {
    /// Every planned subnet lies inside the VPC and no two overlap
    #[test]
    fn prop_layout_is_disjoint_and_contained(
        vpc in vpc_block(),
        zones in 2usize..=4,
        extra in 4u8..=6,
    ) {
        let prefix = vpc.prefix_length() + extra;
        let layout = SubnetLayout::plan(vpc, zones, prefix).unwrap();
        let slots = layout.slots();

        prop_assert_eq!(slots.len(), SubnetTier::ALL.len() * zones);
        for (i, a) in slots.iter().enumerate() {
            prop_assert!(vpc.contains(&a.cidr));
            prop_assert_eq!(a.cidr.prefix_length(), prefix);
            for b in &slots[i + 1..] {
                prop_assert!(!a.cidr.overlaps(&b.cidr), "{} overlaps {}", a.cidr, b.cidr);
            }
        }
    }

    /// Each tier gets exactly one subnet per zone, ordered by zone
    #[test]
    fn prop_one_subnet_per_zone_per_tier(vpc in vpc_block(), zones in 2usize..=4) {
        let layout = SubnetLayout::plan(vpc, zones, vpc.prefix_length() + 4).unwrap();
        for tier in SubnetTier::ALL {
            let found: Vec<usize> = layout.tier(tier).map(|slot| slot.zone).collect();
            prop_assert_eq!(found, (0..zones).collect::<Vec<_>>());
        }
    }

    /// Asking for more blocks than the VPC holds fails instead of wrapping
    #[test]
    fn prop_oversubscribed_layout_rejected(vpc in vpc_block(), zones in 2usize..=6) {
        prop_assert!(SubnetLayout::plan(vpc, zones, vpc.prefix_length() + 1).is_err());
    }

    /// Parsing the rendered form yields the same block
    #[test]
    fn prop_cidr_display_parses(vpc in vpc_block()) {
        prop_assert_eq!(Ipv4Cidr::new(vpc.to_string()).unwrap(), vpc);
    }
}
