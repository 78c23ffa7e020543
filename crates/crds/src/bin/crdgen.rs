//! Prints every infrastructure CRD as a multi-document YAML stream.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/bases/crds.yaml`

use crds::{
    IBMPowerVSCluster, IBMPowerVSImage, IBMPowerVSMachine, IBMPowerVSMachineTemplate, IBMVPCCluster,
    IBMVPCMachine, IBMVPCMachineTemplate,
};
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    let crds = [
        IBMVPCCluster::crd(),
        IBMVPCMachine::crd(),
        IBMVPCMachineTemplate::crd(),
        IBMPowerVSCluster::crd(),
        IBMPowerVSMachine::crd(),
        IBMPowerVSMachineTemplate::crd(),
        IBMPowerVSImage::crd(),
    ];
    for crd in crds {
        println!("---");
        print!("{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
