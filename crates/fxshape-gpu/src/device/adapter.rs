use std::hash::{DefaultHasher, Hash, Hasher};

use crate::backend::GpuId;

/// Derives the stable identifier wgpu adapters are cached under.
///
/// Hashes backend, PCI vendor/device ids, PCI bus id and name, so the same
/// physical GPU maps to the same id for the life of the process. Two identical
/// boards only get distinct ids when the backend reports a bus id.
pub fn gpu_id_for(info: &wgpu::AdapterInfo) -> GpuId {
    let mut hasher = DefaultHasher::new();
    (info.backend as u8).hash(&mut hasher);
    info.vendor.hash(&mut hasher);
    info.device.hash(&mut hasher);
    info.device_pci_bus_id.hash(&mut hasher);
    info.name.hash(&mut hasher);
    GpuId(hasher.finish())
}

/// Lists every adapter visible on `backends`.
pub(crate) fn enumerate(instance: &wgpu::Instance, backends: wgpu::Backends) -> Vec<wgpu::Adapter> {
    pollster::block_on(instance.enumerate_adapters(backends))
}

/// Finds the adapter whose derived id is `gpu_id`.
pub(crate) fn find(
    instance: &wgpu::Instance,
    backends: wgpu::Backends,
    gpu_id: GpuId,
) -> Option<wgpu::Adapter> {
    enumerate(instance, backends)
        .into_iter()
        .find(|adapter| gpu_id_for(&adapter.get_info()) == gpu_id)
}
