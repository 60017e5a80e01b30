//! Vendor-specific region and availability-zone naming.

use kstack_config::{Region, Vendor};

use crate::error::{IacError, IacResult};

/// Availability-zone suffixes, cycled by subnet index.
pub const AZ_SUFFIXES: [&str; 3] = ["a", "b", "c"];

/// The AWS region name for a geographic region.
pub fn aws_region(vendor: Vendor, region: Region) -> IacResult<&'static str> {
    if vendor != Vendor::Aws {
        return Err(IacError::UnsupportedVendor(vendor));
    }

    Ok(match region {
        Region::UsEast => "us-east-1",
        Region::AsiaSoutheast => "ap-southeast-1",
        Region::EuropeWest => "eu-west-1",
        Region::AustraliaEast | Region::Others => "ap-southeast-2",
    })
}

/// Availability zone for the subnet at `index`.
pub fn availability_zone(aws_region: &str, index: usize) -> String {
    format!("{}{}", aws_region, AZ_SUFFIXES[index % AZ_SUFFIXES.len()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aws_region() {
        assert_eq!(aws_region(Vendor::Aws, Region::UsEast).unwrap(), "us-east-1");
        assert_eq!(aws_region(Vendor::Aws, Region::AsiaSoutheast).unwrap(), "ap-southeast-1");
        assert_eq!(aws_region(Vendor::Aws, Region::EuropeWest).unwrap(), "eu-west-1");
        assert_eq!(aws_region(Vendor::Aws, Region::AustraliaEast).unwrap(), "ap-southeast-2");
        assert_eq!(aws_region(Vendor::Aws, Region::Others).unwrap(), "ap-southeast-2");
    }

    #[test]
    fn test_non_aws_vendor_rejected() {
        let err = aws_region(Vendor::Azure, Region::UsEast).unwrap_err();
        assert!(err.to_string().contains("Only AWS is supported"));
    }

    #[test]
    fn test_availability_zone_cycles() {
        let zones: Vec<String> = (0..5).map(|i| availability_zone("ap-southeast-2", i)).collect();
        assert_eq!(
            zones,
            vec![
                "ap-southeast-2a",
                "ap-southeast-2b",
                "ap-southeast-2c",
                "ap-southeast-2a",
                "ap-southeast-2b",
            ]
        );
    }
}
