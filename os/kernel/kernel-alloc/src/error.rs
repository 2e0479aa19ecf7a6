/// Recoverable failures of the frame allocator and the kernel page allocator.
///
/// Fatal conditions (corrupt boot data, exhausted kernel address space,
/// freeing pages that were never mapped) panic instead.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    #[error("address is not managed by the page frame manager")]
    InvalidPageFrameAddress,
    #[error("no page frames available")]
    NoPageFramesAvailable,
    #[error("address is not page aligned")]
    UnalignedAddress,
    #[error("page frame is already free")]
    PageFrameAlreadyFree,
    #[error("page frame is already in use")]
    PageFrameAlreadyInUse,
}
