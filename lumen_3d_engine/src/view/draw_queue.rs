/// Draw queue: effect/geometry pairs sorted by state key before drawing.
///
/// Items sharing an effect end up adjacent, then items sharing geometry
/// within an effect, so the pipeline's diff finds fewer changed slots.
/// Sort keys pack `(effect id, geometry id, item index)` into a `u64` and are
/// sorted with `rdst`'s radix sort. Ties keep submission order.

use std::sync::Arc;
use glam::Mat4;
use rdst::RadixSort;
use rustc_hash::FxHashMap;
use crate::error::Result;
use crate::pipeline::PipelineManager;
use crate::registry::ResourceRegistry;
use crate::view::effect::Effect;
use crate::view::geometry::Geometry;
use crate::view::parameters::{
    ParameterManager, WORLD_MATRIX, WORLD_VIEW_PROJ_MATRIX, VIEW_PROJ_MATRIX,
};
use crate::engine_bail;

const INDEX_BITS: u32 = 24;
const GEOMETRY_BITS: u32 = 20;
const EFFECT_BITS: u32 = 64 - INDEX_BITS - GEOMETRY_BITS;

/// Maximum number of items one queue can hold
pub const MAX_DRAW_ITEMS: usize = 1 << INDEX_BITS;

/// One object to draw
#[derive(Debug, Clone)]
pub struct DrawItem {
    pub effect: Arc<Effect>,
    pub geometry: Arc<Geometry>,
    pub world: Mat4,
}

#[derive(Debug, Clone, Default)]
pub struct DrawQueue {
    items: Vec<DrawItem>,
    /// Item indices in draw order, rebuilt when `sorted` is false
    order: Vec<u32>,
    sorted: bool,
}

impl DrawQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, effect: Arc<Effect>, geometry: Arc<Geometry>, world: Mat4) -> Result<()> {
        if self.items.len() >= MAX_DRAW_ITEMS {
            engine_bail!("lumen3d::DrawQueue", "Draw queue is full ({} items)", MAX_DRAW_ITEMS);
        }
        self.items.push(DrawItem { effect, geometry, world });
        self.sorted = false;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.order.clear();
        self.sorted = true;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[DrawItem] {
        &self.items
    }

    /// Rebuild the draw order if items changed since the last sort
    pub fn sort(&mut self) {
        if self.sorted && self.order.len() == self.items.len() {
            return;
        }

        let mut effect_ids: FxHashMap<*const Effect, u64> = FxHashMap::default();
        let mut geometry_ids: FxHashMap<*const Geometry, u64> = FxHashMap::default();
        let mut keys: Vec<u64> = Vec::with_capacity(self.items.len());

        for (index, item) in self.items.iter().enumerate() {
            let next = effect_ids.len() as u64;
            let effect = *effect_ids.entry(Arc::as_ptr(&item.effect)).or_insert(next);
            let next = geometry_ids.len() as u64;
            let geometry = *geometry_ids.entry(Arc::as_ptr(&item.geometry)).or_insert(next);
            keys.push(pack_key(effect, geometry, index as u64));
        }

        keys.radix_sort_unstable();
        self.order = keys.iter().map(|key| (key & index_mask()) as u32).collect();
        self.sorted = true;
    }

    /// Items in draw order (sorts if needed)
    pub fn sorted_items(&mut self) -> impl Iterator<Item = &DrawItem> + '_ {
        self.sort();
        let items = &self.items;
        self.order.iter().map(move |&i| &items[i as usize])
    }

    /// Bind and draw every item.
    ///
    /// Each item publishes its world matrix (and world-view-projection when
    /// the view-projection parameter is set) before its effect binds.
    pub fn draw(
        &mut self,
        pipeline: &mut PipelineManager,
        registry: &ResourceRegistry,
        params: &mut ParameterManager,
    ) -> Result<usize> {
        let view_proj = params.matrix(VIEW_PROJ_MATRIX);
        let mut drawn = 0;
        for item in self.sorted_items() {
            params.set_matrix(WORLD_MATRIX, item.world);
            if let Some(view_proj) = view_proj {
                params.set_matrix(WORLD_VIEW_PROJ_MATRIX, view_proj * item.world);
            }
            item.effect.bind(pipeline, registry, params)?;
            item.geometry.bind(pipeline)?;
            item.geometry.draw(pipeline, registry)?;
            drawn += 1;
        }
        Ok(drawn)
    }
}

fn index_mask() -> u64 {
    (1u64 << INDEX_BITS) - 1
}

fn pack_key(effect: u64, geometry: u64, index: u64) -> u64 {
    let effect = effect.min((1u64 << EFFECT_BITS) - 1);
    let geometry = geometry.min((1u64 << GEOMETRY_BITS) - 1);
    (effect << (GEOMETRY_BITS + INDEX_BITS)) | (geometry << INDEX_BITS) | index
}

#[cfg(test)]
#[path = "draw_queue_tests.rs"]
mod tests;
