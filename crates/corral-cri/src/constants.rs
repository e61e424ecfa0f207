//! Fixed identifiers of the CRI plugin.

/// Runtime namespace every CRI-managed object lives in.
pub const K8S_NAMESPACE: &str = "k8s.io";

/// CRI API version served.
pub const CRI_VERSION: &str = "v1";

/// Deprecated CRI API version still served for older kubelets.
pub const CRI_VERSION_ALPHA: &str = "v1alpha2";

/// Id of the CRI plugin within `io.corral.grpc.v1`.
pub const PLUGIN_ID: &str = "cri";

/// Id of the NRI plugin within `io.corral.nri.v1`.
pub const NRI_PLUGIN_ID: &str = "nri";

/// Meta export carrying [`CRI_VERSION`].
pub const EXPORT_CRI_VERSION: &str = "CRIVersion";

/// Meta export carrying [`CRI_VERSION_ALPHA`].
pub const EXPORT_CRI_VERSION_ALPHA: &str = "CRIVersionAlpha";
