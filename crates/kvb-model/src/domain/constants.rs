//! Well-known keys and defaults shared by the model, core and step layers.
//!
//! Steps communicate through the state bag by convention only, so every key
//! lives here instead of being spelled out at each `put` / `get` site.

/// Guest address accepted by address discovery.
pub const STATE_IP: &str = "ip";

/// Local host of the control-plane tunnel.
pub const STATE_FORWARDING_HOST: &str = "forwarding_host";

/// Local port of the control-plane tunnel.
pub const STATE_FORWARDING_PORT: &str = "forwarding_port";

/// Set to `true` once the in-guest agent reported itself connected.
pub const STATE_GUEST_AGENT: &str = "guest_agent";

/// Name of the reusable image produced by the final step.
pub const STATE_BOOTABLE_VOLUME_NAME: &str = "bootable_volume_name";

/// Last error message recorded by a step that halted.
pub const STATE_ERROR: &str = "error";

/// Connected remote session handle.
pub const STATE_COMMUNICATOR: &str = "communicator";

/// Resources intentionally left behind by cleanups honouring a keep flag.
pub const STATE_RETAINED: &str = "retained_resources";

/// Label selecting the default instance type of a reusable image.
pub const LABEL_DEFAULT_INSTANCETYPE: &str = "instancetype.kubevirt.io/default-instancetype";

/// Label selecting the default preference of a reusable image.
pub const LABEL_DEFAULT_PREFERENCE: &str = "instancetype.kubevirt.io/default-preference";

/// Suffix appended to the VM name for its root data volume.
pub const ROOTDISK_SUFFIX: &str = "-rootdisk";

/// Suffix appended to the image name when no VM name is configured.
pub const VM_NAME_SUFFIX: &str = "-builder";

/// Volume label of the auxiliary media drive on non-Windows guests.
pub const DEFAULT_MEDIA_LABEL: &str = "OEMDRV";

/// Container image carrying the VirtIO drivers for Windows guests.
pub const DEFAULT_VIRTIO_CONTAINER: &str = "quay.io/kubevirt/virtio-container-disk:v1.6.0";

/// Instance type kind used when none is configured.
pub const DEFAULT_INSTANCETYPE_KIND: &str = "virtualmachineclusterinstancetype";

/// Preference kind used when none is configured.
pub const DEFAULT_PREFERENCE_KIND: &str = "virtualmachineclusterpreference";

/// Condition type reported by the control plane once the guest agent is up.
pub const CONDITION_AGENT_CONNECTED: &str = "AgentConnected";
