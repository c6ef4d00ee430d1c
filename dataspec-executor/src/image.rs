//! Final image layout
//!
//! ```text
//! [0..4)    APPDATA_MAGIC_NUM
//! [4..8)    DSE_VERSION
//! [8..72)   pointer table, one u32 per region (0 when unallocated)
//! [72..)    region data in id order
//! ```
//!
//! Every word is little-endian. Unfilled regions occupy their reserved size
//! as zeros.

use crate::memory::MemoryRegion;
use dataspec_isa::{
    DataSpecError, Result, SlotTable, APPDATA_MAGIC_NUM, APP_PTR_TABLE_BYTE_SIZE, DSE_VERSION,
};

/// Bytes the image of `regions` occupies
pub fn image_size(regions: &SlotTable<MemoryRegion>) -> u64 {
    APP_PTR_TABLE_BYTE_SIZE as u64
        + regions
            .allocated()
            .map(|(_, region)| region.size() as u64)
            .sum::<u64>()
}

/// Lay out header, pointer table and region data
pub fn build_image(regions: &SlotTable<MemoryRegion>, space_available: u32) -> Result<Vec<u8>> {
    let required = image_size(regions);
    if required > space_available as u64 {
        return Err(DataSpecError::TablePointerOutOfMemory {
            available: space_available,
            required: u32::try_from(required).unwrap_or(u32::MAX),
        });
    }

    let mut image = Vec::with_capacity(required as usize);
    image.extend_from_slice(&APPDATA_MAGIC_NUM.to_le_bytes());
    image.extend_from_slice(&DSE_VERSION.to_le_bytes());

    let mut offset = APP_PTR_TABLE_BYTE_SIZE as u32;
    for region in regions.iter() {
        let pointer = match region {
            Some(region) => {
                let pointer = offset;
                offset += region.size();
                pointer
            }
            None => 0,
        };
        image.extend_from_slice(&pointer.to_le_bytes());
    }

    for (_, region) in regions.allocated() {
        if region.is_unfilled() {
            image.resize(image.len() + region.size() as usize, 0);
        } else {
            image.extend_from_slice(region.data());
        }
    }
    Ok(image)
}
