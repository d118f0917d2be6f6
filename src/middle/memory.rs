//! The virtual memory allocator.
//!
//! Hands out disjoint integer addresses partitioned by segment and scalar
//! type. The segment (and type) of an address is recoverable purely from
//! its numeric range, which is the only thing the virtual machine needs to
//! know to route a read or write — see [`segment_of`].

use std::fmt;

use crate::common::Map;
use crate::middle::types::Type;

pub type VirtAddr = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Segment {
    Global,
    Local,
    Temp,
    Const,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Segment::Global => "global",
            Segment::Local => "local",
            Segment::Temp => "temp",
            Segment::Const => "const",
        };
        write!(f, "{s}")
    }
}

const RANGE_SIZE: VirtAddr = 1000;
const SEGMENTS: [Segment; 4] = [Segment::Global, Segment::Local, Segment::Temp, Segment::Const];
const TYPES: [Type; 4] = [Type::Integer, Type::Float, Type::Bool, Type::String];

fn base(segment: Segment, ty: Type) -> VirtAddr {
    let segment_base = match segment {
        Segment::Global => 10_000,
        Segment::Local => 20_000,
        Segment::Temp => 30_000,
        Segment::Const => 40_000,
    };
    let type_offset = match ty {
        Type::Integer => 0,
        Type::Float => 1,
        Type::Bool => 2,
        Type::String => 3,
        Type::Error => unreachable!("the Error sentinel is never given an address"),
    };
    segment_base + type_offset * RANGE_SIZE
}

#[derive(Debug, PartialEq, Eq)]
pub struct AllocError {
    pub segment: Segment,
    pub ty: Type,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment-overflow: no space left for {} {}", self.segment, self.ty)
    }
}

impl std::error::Error for AllocError {}

pub struct MemoryManager {
    counters: Map<(Segment, Type), VirtAddr>,
    free_temps: Map<Type, Vec<VirtAddr>>,
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryManager {
    pub fn new() -> Self {
        let mut mgr = MemoryManager { counters: Map::new(), free_temps: Map::new() };
        mgr.reset_all();
        mgr
    }

    fn reset_counters(&mut self, segment: Segment) {
        for ty in TYPES {
            self.counters.insert((segment, ty), base(segment, ty));
        }
    }

    pub fn reset_locals(&mut self) {
        self.reset_counters(Segment::Local);
    }

    pub fn reset_temps(&mut self) {
        self.reset_counters(Segment::Temp);
        for ty in TYPES {
            self.free_temps.insert(ty, Vec::new());
        }
    }

    pub fn reset_all(&mut self) {
        for segment in SEGMENTS {
            self.reset_counters(segment);
        }
        for ty in TYPES {
            self.free_temps.insert(ty, Vec::new());
        }
    }

    /// Allocate a fresh address, or pop a recycled one from the temp
    /// free-list (LIFO) when `segment` is [`Segment::Temp`].
    pub fn allocate(&mut self, segment: Segment, ty: Type) -> Result<VirtAddr, AllocError> {
        if segment == Segment::Temp {
            if let Some(addr) = self.free_temps.get_mut(&ty).and_then(|list| list.pop()) {
                return Ok(addr);
            }
        }
        let counter = self.counters.entry((segment, ty)).or_insert_with(|| base(segment, ty));
        let addr = *counter;
        if addr >= base(segment, ty) + RANGE_SIZE {
            return Err(AllocError { segment, ty });
        }
        *counter += 1;
        Ok(addr)
    }

    /// Push a temporary back onto its type's free-list. Not validated for
    /// liveness: callers must only free temporaries they know are dead.
    pub fn free_temp(&mut self, ty: Type, addr: VirtAddr) {
        self.free_temps.entry(ty).or_default().push(addr);
    }

    pub fn segment_of(addr: VirtAddr) -> Option<Segment> {
        Self::locate(addr).map(|(segment, _)| segment)
    }

    /// The scalar type an address was carved from, independent of whatever
    /// runtime value currently lives there. Used to produce the zero value
    /// for a never-written address.
    pub fn type_of(addr: VirtAddr) -> Option<Type> {
        Self::locate(addr).map(|(_, ty)| ty)
    }

    fn locate(addr: VirtAddr) -> Option<(Segment, Type)> {
        for segment in SEGMENTS {
            for ty in TYPES {
                let b = base(segment, ty);
                if addr >= b && addr < b + RANGE_SIZE {
                    return Some((segment, ty));
                }
            }
        }
        None
    }

    /// Per-type counts of addresses allocated so far in `segment`, i.e. the
    /// distance each counter has moved from its base.
    pub fn usage(&self, segment: Segment) -> Map<Type, usize> {
        TYPES
            .into_iter()
            .map(|ty| {
                let used = self.counters.get(&(segment, ty)).copied().unwrap_or_else(|| base(segment, ty));
                (ty, (used - base(segment, ty)) as usize)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_are_monotonic_within_a_pool() {
        let mut mem = MemoryManager::new();
        let a = mem.allocate(Segment::Global, Type::Integer).unwrap();
        let b = mem.allocate(Segment::Global, Type::Integer).unwrap();
        assert_eq!(b, a + 1);
    }

    #[test]
    fn distinct_segment_type_pairs_never_collide() {
        let mut mem = MemoryManager::new();
        let g = mem.allocate(Segment::Global, Type::Integer).unwrap();
        let l = mem.allocate(Segment::Local, Type::Integer).unwrap();
        let t = mem.allocate(Segment::Temp, Type::Integer).unwrap();
        let c = mem.allocate(Segment::Const, Type::Integer).unwrap();
        assert_eq!(MemoryManager::type_of(g), Some(Type::Integer));
        assert_eq!(MemoryManager::segment_of(g), Some(Segment::Global));
        assert_eq!(MemoryManager::segment_of(l), Some(Segment::Local));
        assert_eq!(MemoryManager::segment_of(t), Some(Segment::Temp));
        assert_eq!(MemoryManager::segment_of(c), Some(Segment::Const));
    }

    #[test]
    fn freed_temps_are_recycled_lifo() {
        let mut mem = MemoryManager::new();
        let t1 = mem.allocate(Segment::Temp, Type::Integer).unwrap();
        let t2 = mem.allocate(Segment::Temp, Type::Integer).unwrap();
        mem.free_temp(Type::Integer, t1);
        mem.free_temp(Type::Integer, t2);
        assert_eq!(mem.allocate(Segment::Temp, Type::Integer).unwrap(), t2);
        assert_eq!(mem.allocate(Segment::Temp, Type::Integer).unwrap(), t1);
    }

    #[test]
    fn reset_locals_rewinds_only_locals() {
        let mut mem = MemoryManager::new();
        mem.allocate(Segment::Global, Type::Integer).unwrap();
        let before_local = mem.allocate(Segment::Local, Type::Integer).unwrap();
        mem.reset_locals();
        let after_reset = mem.allocate(Segment::Local, Type::Integer).unwrap();
        assert_eq!(before_local, after_reset);
    }

    #[test]
    fn usage_reports_distance_from_base() {
        let mut mem = MemoryManager::new();
        mem.allocate(Segment::Local, Type::Integer).unwrap();
        mem.allocate(Segment::Local, Type::Integer).unwrap();
        mem.allocate(Segment::Local, Type::Float).unwrap();
        let usage = mem.usage(Segment::Local);
        assert_eq!(usage[&Type::Integer], 2);
        assert_eq!(usage[&Type::Float], 1);
        assert_eq!(usage[&Type::Bool], 0);
    }

    #[test]
    fn overflow_is_reported_as_segment_overflow() {
        let mut mem = MemoryManager::new();
        for _ in 0..RANGE_SIZE {
            mem.allocate(Segment::Temp, Type::Integer).unwrap();
        }
        assert!(mem.allocate(Segment::Temp, Type::Integer).is_err());
    }
}
