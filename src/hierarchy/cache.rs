//! Set-associative cache level

use crate::error::InvariantFailure;

use super::block::DataBlock;

pub fn get_log_2(value: u32) -> u32 {
    assert!(value > 0);
    31 - value.leading_zeros()
}

pub fn is_pow_2(value: u32) -> bool {
    value != 0 && value & (value - 1) == 0
}

pub fn get_mask(bits: u32) -> u32 {
    ((1u64 << bits) - 1) as u32
}

/// Validated shape of one cache level and its 32-bit address partition.
// The address looks like this:
// | tag | index | offset |
#[derive(Clone, Copy, Debug)]
pub struct CacheGeometry {
    pub block_size: u32,
    pub total_size: u32,
    pub set_assoc: u32,
    pub num_sets: u32,

    pub offset_bits: u32,
    pub index_bits: u32,
    pub tag_bits: u32,
}

impl CacheGeometry {
    pub fn make(
        block_size: u32,
        total_size: u32,
        set_assoc: u32,
    ) -> Result<Self, String> {
        if block_size == 0 || !is_pow_2(block_size) {
            return Err(format!(
                "block size {} is not a power of two",
                block_size
            ));
        }
        if set_assoc == 0 {
            return Err("set associativity must be at least 1".to_string());
        }
        if total_size == 0 || total_size % (block_size * set_assoc) != 0 {
            return Err(format!(
                "total size {} is not a multiple of block size {} x associativity {}",
                total_size, block_size, set_assoc
            ));
        }
        let num_sets = total_size / block_size / set_assoc;
        if !is_pow_2(num_sets) {
            return Err(format!(
                "set count {} is not a power of two",
                num_sets
            ));
        }
        let offset_bits = get_log_2(block_size);
        let index_bits = get_log_2(num_sets);
        if offset_bits + index_bits > 31 {
            return Err(format!(
                "offset ({} bits) and index ({} bits) leave no tag bits",
                offset_bits, index_bits
            ));
        }
        Ok(Self {
            block_size,
            total_size,
            set_assoc,
            num_sets,
            offset_bits,
            index_bits,
            tag_bits: 32 - offset_bits - index_bits,
        })
    }

    /// Split a raw address into its `(tag, set index, offset)` fields
    pub fn decode(&self, address: u32) -> (u32, u32, u32) {
        let tag = (address >> (self.offset_bits + self.index_bits))
            & get_mask(self.tag_bits);
        let index = (address >> self.offset_bits) & get_mask(self.index_bits);
        let offset = address & get_mask(self.offset_bits);
        (tag, index, offset)
    }

    /// Bit-pack `(tag, set index, offset)` back into a raw address
    pub fn encode(&self, tag: u32, index: u32, offset: u32) -> u32 {
        (tag << (self.offset_bits + self.index_bits))
            | (index << self.offset_bits)
            | offset
    }
}

/// One level of the cache hierarchy.
///
/// Construction is staged by the build commands: the id is fixed when
/// the hierarchy is configured, the geometry by `scd`, the latency by
/// `scl`, and the block array is materialized by `inc`.
pub struct CacheLevel {
    id: u32,
    latency: u64,
    latency_set: bool,
    geometry: Option<CacheGeometry>,
    blocks: Vec<DataBlock>,

    hits: u64,
    misses: u64,
}

impl CacheLevel {
    pub fn make(id: u32) -> Self {
        Self {
            id,
            latency: 0,
            latency_set: false,
            geometry: None,
            blocks: Vec::new(),
            hits: 0,
            misses: 0,
        }
    }

    fn geom(&self) -> &CacheGeometry {
        // The run phase is gated on every level being dimensioned
        self.geometry.as_ref().expect("cache level used before 'scd'")
    }

    /// Fix the level's shape. Rejected once the block array exists.
    pub fn set_dimensions(
        &mut self,
        block_size: u32,
        total_size: u32,
        set_assoc: u32,
    ) -> Result<(), InvariantFailure> {
        if self.is_initialized() {
            return Err(InvariantFailure::ReshapedAfterInit {
                command: "scd",
                level: self.id,
            });
        }
        let geometry = CacheGeometry::make(block_size, total_size, set_assoc)
            .map_err(|reason| InvariantFailure::BadGeometry {
                level: self.id,
                reason,
            })?;
        self.geometry = Some(geometry);
        Ok(())
    }

    /// Cycles one access at this level costs
    pub fn set_latency(
        &mut self,
        latency: u64,
    ) -> Result<(), InvariantFailure> {
        if self.is_initialized() {
            return Err(InvariantFailure::ReshapedAfterInit {
                command: "scl",
                level: self.id,
            });
        }
        self.latency = latency;
        self.latency_set = true;
        Ok(())
    }

    /// Materialize the block array, all ways invalid
    pub fn init_array(&mut self) -> Result<(), InvariantFailure> {
        let geometry = self.geometry.ok_or(
            InvariantFailure::InitBeforeDimension { level: self.id },
        )?;
        let block_count = (geometry.num_sets * geometry.set_assoc) as usize;
        self.blocks = vec![DataBlock::default(); block_count];
        Ok(())
    }

    /// The ways of set `set`, as a flat slice
    pub fn set_ways(&self, set: u32) -> &[DataBlock] {
        match &self.geometry {
            Some(geometry) if !self.blocks.is_empty() => {
                let assoc = geometry.set_assoc as usize;
                let begin = set as usize * assoc;
                &self.blocks[begin..begin + assoc]
            }
            _ => &[],
        }
    }

    /// Search the target set for the address' tag. On a hit the way is
    /// touched with `now` and `new_dirty`; either way the per-level
    /// lookup counters advance.
    pub fn probe(&mut self, address: u32, now: u64, new_dirty: bool) -> bool {
        let (tag, set, _) = self.geom().decode(address);
        let assoc = self.geom().set_assoc as usize;
        let begin = set as usize * assoc;
        for way in self.blocks[begin..begin + assoc].iter_mut() {
            if way.matches(tag) {
                way.touch(now, new_dirty);
                self.hits += 1;
                return true;
            }
        }
        self.misses += 1;
        false
    }

    /// Install the address' tag into the first empty way of its set.
    /// Returns false when the set is full.
    pub fn allocate(&mut self, address: u32, dirty: bool, now: u64) -> bool {
        let (tag, set, _) = self.geom().decode(address);
        let assoc = self.geom().set_assoc as usize;
        let begin = set as usize * assoc;
        for way in self.blocks[begin..begin + assoc].iter_mut() {
            if !way.valid() {
                way.install(tag, dirty, now);
                return true;
            }
        }
        false
    }

    /// Flush the least-recently-used way of the address' set.
    /// Ties are broken by the smallest way index. Returns the victim's
    /// dirty flag and its reconstructed address (the requesting
    /// address' offset is carried over).
    pub fn evict_lru(&mut self, address: u32) -> (bool, u32) {
        let (_, set, offset) = self.geom().decode(address);
        let assoc = self.geom().set_assoc as usize;
        let begin = set as usize * assoc;
        let mut victim = begin;
        for i in begin + 1..begin + assoc {
            if self.blocks[i].last_use() < self.blocks[victim].last_use() {
                victim = i;
            }
        }
        let was_dirty = self.blocks[victim].dirty();
        let victim_tag = self.blocks[victim].tag();
        let victim_address = self.geom().encode(victim_tag, set, offset);
        self.blocks[victim].flush();
        (was_dirty, victim_address)
    }

    /// Decode an address against this level's partition
    pub fn decode(&self, address: u32) -> (u32, u32, u32) {
        self.geom().decode(address)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn latency(&self) -> u64 {
        self.latency
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn num_sets(&self) -> u32 {
        self.geometry.map_or(0, |g| g.num_sets)
    }

    pub fn set_assoc(&self) -> u32 {
        self.geometry.map_or(0, |g| g.set_assoc)
    }

    pub fn has_geometry(&self) -> bool {
        self.geometry.is_some()
    }

    pub fn has_latency(&self) -> bool {
        self.latency_set
    }

    pub fn is_initialized(&self) -> bool {
        !self.blocks.is_empty()
    }
}
