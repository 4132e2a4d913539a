//! Prints the NodeFeatureDiscovery CRD manifest to stdout.
//!
//! Usage: `cargo run --bin crdgen > deploy/crds/nodefeaturediscovery.yaml`

use crds::NodeFeatureDiscovery;
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&NodeFeatureDiscovery::crd())?);
    Ok(())
}
