/// Render views, effects, geometry and the named parameter table

mod lifecycle;
mod render_view;
mod perspective_view;
mod gbuffer_view;
pub mod parameters;
mod effect;
mod geometry;
mod draw_queue;

pub use lifecycle::ViewState;
pub use render_view::{RenderView, ViewPass, FrameContext};
pub use perspective_view::PerspectiveView;
pub use gbuffer_view::{GBufferView, MASK_STENCIL_REF};
pub use parameters::{ParameterManager, ParameterValue, ParameterKind};
pub use effect::{
    Effect, EffectDesc, BindingKind, ResourceBinding, ConstantField, ConstantBufferLayout,
};
pub use geometry::{Geometry, QuadVertex};
pub use draw_queue::{DrawQueue, DrawItem, MAX_DRAW_ITEMS};
