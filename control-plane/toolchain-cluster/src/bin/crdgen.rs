use kube::core::CustomResourceExt;
use toolchain_cluster::crd::ToolchainCluster;

fn main() {
    let crd = ToolchainCluster::crd();
    let yaml = serde_yaml::to_string(&crd).expect("serialize CRD to YAML");
    println!("{}", yaml);
}
