//! CRD generator
//!
//! Prints the `AquaScannerAccount` CustomResourceDefinition as YAML:
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/aquascanneraccount.yaml
//! ```

use anyhow::Result;
use aqua_scanner_account_controller::AquaScannerAccount;
use kube::CustomResourceExt;

fn main() -> Result<()> {
    print!("{}", serde_yaml::to_string(&AquaScannerAccount::crd())?);
    Ok(())
}
