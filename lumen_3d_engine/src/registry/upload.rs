/// Off-thread resource creation.
///
/// An `UploadQueue` creates native objects on the calling (worker) thread
/// through the shared device and sends them back over a channel. The
/// registry inserts them in `integrate_uploads`, on the render thread, which
/// stays the registry's only writer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use crate::device::{GraphicsDevice, NativeId, BufferDesc, Texture2dDesc, ViewDesc, ViewKind};
use crate::error::Result;
use crate::engine_trace;

/// Identifies one upload request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UploadTicket(u64);

/// Native objects created off-thread, not yet owned by the registry
pub(crate) enum PendingResource {
    Buffer {
        native: NativeId,
        desc: BufferDesc,
    },
    Texture {
        native: NativeId,
        desc: Texture2dDesc,
        views: Vec<(ViewDesc, NativeId)>,
    },
}

pub(crate) struct CompletedUpload {
    pub ticket: UploadTicket,
    /// Device generation the objects were created on
    pub generation: u64,
    pub name: Option<String>,
    pub result: Result<PendingResource>,
}

/// Cloneable, `Send` handle for creating resources from worker threads
#[derive(Clone)]
pub struct UploadQueue {
    device: Arc<dyn GraphicsDevice>,
    generation: u64,
    sender: mpsc::Sender<CompletedUpload>,
    next_ticket: Arc<AtomicU64>,
}

impl UploadQueue {
    pub(crate) fn new(
        device: Arc<dyn GraphicsDevice>,
        generation: u64,
        sender: mpsc::Sender<CompletedUpload>,
        next_ticket: Arc<AtomicU64>,
    ) -> Self {
        Self { device, generation, sender, next_ticket }
    }

    fn ticket(&self) -> UploadTicket {
        UploadTicket(self.next_ticket.fetch_add(1, Ordering::Relaxed))
    }

    fn send(&self, ticket: UploadTicket, name: Option<&str>, result: Result<PendingResource>) {
        let upload = CompletedUpload {
            ticket,
            generation: self.generation,
            name: name.map(str::to_string),
            result,
        };
        // Receiver gone: the registry was dropped, nothing left to own the objects
        if let Err(mpsc::SendError(upload)) = self.sender.send(upload) {
            if let Ok(pending) = upload.result {
                release_pending(self.device.as_ref(), pending);
            }
        }
    }

    /// Create a buffer on this thread; the handle is available after the
    /// next `integrate_uploads`
    pub fn upload_buffer(&self, desc: &BufferDesc, name: Option<&str>) -> UploadTicket {
        let ticket = self.ticket();
        let result = self.device.create_buffer(desc).map(|native| PendingResource::Buffer {
            native,
            desc: desc.without_data(),
        });
        engine_trace!("lumen3d::UploadQueue", "Buffer upload {:?} finished", ticket);
        self.send(ticket, name, result);
        ticket
    }

    /// Create a texture and the views its bind flags request
    pub fn upload_texture_2d(&self, desc: &Texture2dDesc, name: Option<&str>) -> UploadTicket {
        let ticket = self.ticket();
        let result = create_texture_with_views(self.device.as_ref(), desc);
        engine_trace!("lumen3d::UploadQueue", "Texture upload {:?} finished", ticket);
        self.send(ticket, name, result);
        ticket
    }
}

/// View kinds created for a texture, in creation order
pub(crate) const TEXTURE_VIEW_KINDS: [ViewKind; 4] = [
    ViewKind::ShaderResource,
    ViewKind::RenderTarget,
    ViewKind::DepthStencil,
    ViewKind::UnorderedAccess,
];

/// Create the views of `texture` requested by its bind flags.
///
/// On failure every view created so far is released; the texture is not.
pub(crate) fn create_texture_views(
    device: &dyn GraphicsDevice,
    texture: NativeId,
    desc: &Texture2dDesc,
) -> Result<Vec<(ViewDesc, NativeId)>> {
    let mut views = Vec::new();
    for kind in TEXTURE_VIEW_KINDS {
        if !desc.bind.contains(kind.required_bind_flag()) {
            continue;
        }
        let view_desc = ViewDesc::new(kind);
        match device.create_view(texture, &view_desc) {
            Ok(native) => views.push((view_desc, native)),
            Err(err) => {
                for (_, native) in views {
                    device.release(native);
                }
                return Err(err);
            }
        }
    }
    Ok(views)
}

fn create_texture_with_views(device: &dyn GraphicsDevice, desc: &Texture2dDesc) -> Result<PendingResource> {
    let native = device.create_texture_2d(desc)?;
    match create_texture_views(device, native, desc) {
        Ok(views) => Ok(PendingResource::Texture { native, desc: desc.without_data(), views }),
        Err(err) => {
            device.release(native);
            Err(err)
        }
    }
}

/// Release objects that will never reach the registry
pub(crate) fn release_pending(device: &dyn GraphicsDevice, pending: PendingResource) {
    match pending {
        PendingResource::Buffer { native, .. } => device.release(native),
        PendingResource::Texture { native, views, .. } => {
            for (_, view) in views {
                device.release(view);
            }
            device.release(native);
        }
    }
}
