//! Page-granular region map.
//!
//! Backs the interpreter's address space with one byte buffer per mapped region.
//! Host accesses (`read`/`write`) ignore permissions and may span adjacent regions;
//! guest accesses (`load`/`store`/`fetch`) enforce permissions and must stay inside
//! a single region.

use crate::common::constants::PAGE_SIZE;
use crate::memory::Permission;

use super::fault::{EngineError, Fault};

/// One mapped region.
#[derive(Debug, Clone)]
struct Region {
    base: u64,
    perms: Permission,
    data: Vec<u8>,
}

impl Region {
    fn end(&self) -> u64 {
        self.base + self.data.len() as u64
    }

    fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.end()
    }

    /// Byte offset of `address` if `size` bytes starting there stay inside the region.
    fn span(&self, address: u64, size: usize) -> Option<usize> {
        let offset = address.checked_sub(self.base)? as usize;
        (offset.checked_add(size)? <= self.data.len()).then_some(offset)
    }
}

/// Mapped regions, kept sorted by base address and never overlapping.
#[derive(Debug, Clone, Default)]
pub struct RegionMap {
    regions: Vec<Region>,
}

impl RegionMap {
    /// Creates an empty address space.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a zero-filled region.
    ///
    /// # Errors
    ///
    /// * [`EngineError::InvalidMapping`] if `address` or `size` is not a multiple of the
    ///   page size, `size` is zero, the region wraps or its buffer cannot be allocated.
    /// * [`EngineError::MapOverlap`] if it intersects an existing region.
    pub fn map(&mut self, address: u64, size: u64, perms: Permission) -> Result<(), EngineError> {
        let aligned = address % PAGE_SIZE == 0 && size % PAGE_SIZE == 0;
        let end = address.checked_add(size);
        let Some(end) = end.filter(|_| aligned && size != 0) else {
            return Err(EngineError::InvalidMapping { address, size });
        };
        if self.regions.iter().any(|r| address < r.end() && r.base < end) {
            return Err(EngineError::MapOverlap { address, size });
        }
        let mut data = Vec::new();
        let len = usize::try_from(size)
            .ok()
            .filter(|&len| data.try_reserve_exact(len).is_ok())
            .ok_or(EngineError::InvalidMapping { address, size })?;
        data.resize(len, 0);

        let index = self.regions.partition_point(|r| r.base < address);
        self.regions.insert(
            index,
            Region {
                base: address,
                perms,
                data,
            },
        );
        Ok(())
    }

    /// Removes the region mapped exactly at `address` with `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unmapped`] if no region matches.
    pub fn unmap(&mut self, address: u64, size: u64) -> Result<(), EngineError> {
        let index = self
            .regions
            .iter()
            .position(|r| r.base == address && r.data.len() as u64 == size)
            .ok_or(EngineError::Unmapped(address))?;
        let _ = self.regions.remove(index);
        Ok(())
    }

    /// Number of mapped regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns `true` when nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    fn find(&self, address: u64) -> Option<&Region> {
        self.regions.iter().find(|r| r.contains(address))
    }

    fn find_mut(&mut self, address: u64) -> Option<&mut Region> {
        self.regions.iter_mut().find(|r| r.contains(address))
    }

    /// Host read; may span adjacent regions.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unmapped`] with the first unmapped address.
    pub fn read(&self, address: u64, size: usize) -> Result<Vec<u8>, EngineError> {
        let mut out = Vec::with_capacity(size);
        let mut cursor = address;
        while out.len() < size {
            let region = self.find(cursor).ok_or(EngineError::Unmapped(cursor))?;
            let offset = (cursor - region.base) as usize;
            let take = (size - out.len()).min(region.data.len() - offset);
            out.extend_from_slice(&region.data[offset..offset + take]);
            cursor += take as u64;
        }
        Ok(out)
    }

    /// Host write; may span adjacent regions.
    ///
    /// Nothing is written unless the whole range is mapped.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unmapped`] with the first unmapped address.
    pub fn write(&mut self, address: u64, data: &[u8]) -> Result<(), EngineError> {
        let _ = self.read(address, data.len())?;
        let mut cursor = address;
        let mut rest = data;
        while !rest.is_empty() {
            let region = self.find_mut(cursor).ok_or(EngineError::Unmapped(cursor))?;
            let offset = (cursor - region.base) as usize;
            let take = rest.len().min(region.data.len() - offset);
            region.data[offset..offset + take].copy_from_slice(&rest[..take]);
            cursor += take as u64;
            rest = &rest[take..];
        }
        Ok(())
    }

    /// Guest load of `size` (1, 2, 4 or 8) little-endian bytes, zero-extended.
    ///
    /// # Errors
    ///
    /// [`Fault::ReadUnmapped`] or [`Fault::ReadProtected`].
    pub fn load(&self, address: u64, size: usize) -> Result<u64, Fault> {
        let region = self.find(address).ok_or(Fault::ReadUnmapped(address))?;
        if !region.perms.contains(Permission::READ) {
            return Err(Fault::ReadProtected(address));
        }
        let offset = region
            .span(address, size)
            .ok_or(Fault::ReadUnmapped(region.end()))?;
        let mut buf = [0u8; 8];
        buf[..size].copy_from_slice(&region.data[offset..offset + size]);
        Ok(u64::from_le_bytes(buf))
    }

    /// Guest store of the low `size` bytes of `value`.
    ///
    /// # Errors
    ///
    /// [`Fault::WriteUnmapped`] or [`Fault::WriteProtected`].
    pub fn store(&mut self, address: u64, size: usize, value: u64) -> Result<(), Fault> {
        let region = self.find_mut(address).ok_or(Fault::WriteUnmapped(address))?;
        if !region.perms.contains(Permission::WRITE) {
            return Err(Fault::WriteProtected(address));
        }
        let end = region.end();
        let offset = region.span(address, size).ok_or(Fault::WriteUnmapped(end))?;
        region.data[offset..offset + size].copy_from_slice(&value.to_le_bytes()[..size]);
        Ok(())
    }

    /// Guest fetch of one 32-bit instruction word.
    ///
    /// # Errors
    ///
    /// [`Fault::FetchUnaligned`], [`Fault::FetchUnmapped`] or [`Fault::FetchProtected`].
    pub fn fetch(&self, address: u64) -> Result<u32, Fault> {
        if address % 4 != 0 {
            return Err(Fault::FetchUnaligned(address));
        }
        let region = self.find(address).ok_or(Fault::FetchUnmapped(address))?;
        if !region.perms.contains(Permission::EXEC) {
            return Err(Fault::FetchProtected(address));
        }
        let offset = region
            .span(address, 4)
            .ok_or(Fault::FetchUnmapped(address))?;
        let mut word = [0u8; 4];
        word.copy_from_slice(&region.data[offset..offset + 4]);
        Ok(u32::from_le_bytes(word))
    }
}
