// ============================================================
// Layer 5 — Device Placement
// ============================================================
// Decides where the model lives and how its parameters are
// gathered for a checkpoint. The mode is picked once, from the
// device list, when the trainer is built:
//
//   one device    → SingleDevice: snapshot the encoder as-is
//   many devices  → MultiDevice:  compute runs on the primary
//                   device; snapshots are always forked onto
//                   it first so a checkpoint never depends on
//                   where a parameter happened to be resident
//
// Only encoder parameters are snapshotted: the atom-type head
// exists for pre-training and is not part of the checkpoint.

use anyhow::{ensure, Result};
use burn::prelude::*;

use crate::ml::model::{GraphEncoder, GraphEncoderRecord};

/// Produces the serialisable parameter snapshot written to checkpoints.
pub trait ParameterSnapshot<B: Backend>: Send {
    /// Device the model and batches are placed on
    fn primary_device(&self) -> &B::Device;

    fn snapshot(&self, encoder: &GraphEncoder<B>) -> GraphEncoderRecord<B>;

    fn describe(&self) -> String;
}

pub struct SingleDevice<B: Backend> {
    device: B::Device,
}

impl<B: Backend> SingleDevice<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> ParameterSnapshot<B> for SingleDevice<B> {
    fn primary_device(&self) -> &B::Device {
        &self.device
    }

    fn snapshot(&self, encoder: &GraphEncoder<B>) -> GraphEncoderRecord<B> {
        encoder.clone().into_record()
    }

    fn describe(&self) -> String {
        format!("single device {:?}", self.device)
    }
}

pub struct MultiDevice<B: Backend> {
    devices: Vec<B::Device>,
}

impl<B: Backend> MultiDevice<B> {
    pub fn new(devices: Vec<B::Device>) -> Result<Self> {
        ensure!(devices.len() > 1, "multi-device placement needs at least two devices");
        Ok(Self { devices })
    }
}

impl<B: Backend> ParameterSnapshot<B> for MultiDevice<B> {
    fn primary_device(&self) -> &B::Device {
        &self.devices[0]
    }

    fn snapshot(&self, encoder: &GraphEncoder<B>) -> GraphEncoderRecord<B> {
        encoder.clone().fork(self.primary_device()).into_record()
    }

    fn describe(&self) -> String {
        format!("{} devices, primary {:?}", self.devices.len(), self.devices[0])
    }
}

/// Pick the placement mode for a device list.
pub fn placement_for<B: Backend>(devices: Vec<B::Device>) -> Result<Box<dyn ParameterSnapshot<B>>> {
    ensure!(!devices.is_empty(), "no device given");
    if devices.len() == 1 {
        Ok(Box::new(SingleDevice::new(devices[0].clone())))
    } else {
        Ok(Box::new(MultiDevice::new(devices)?))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use crate::ml::model::GraphEncoderConfig;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_mode_follows_device_count() {
        let one = placement_for::<TestBackend>(vec![Default::default()]).unwrap();
        assert!(one.describe().starts_with("single"));

        let two = placement_for::<TestBackend>(vec![Default::default(), Default::default()]).unwrap();
        assert!(two.describe().starts_with("2 devices"));

        assert!(placement_for::<TestBackend>(Vec::new()).is_err());
    }

    #[test]
    fn test_snapshots_agree_across_modes() {
        let device = Default::default();
        let encoder = GraphEncoderConfig::new(4, 6, 3).init::<TestBackend>(&device);

        let single = SingleDevice::<TestBackend>::new(device.clone());
        let multi  = MultiDevice::<TestBackend>::new(vec![device.clone(), device]).unwrap();

        let a = single.snapshot(&encoder).input_proj.weight.val().into_data();
        let b = multi.snapshot(&encoder).input_proj.weight.val().into_data();
        a.assert_eq(&b, true);
    }
}
