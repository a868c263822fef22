use crate::error::Result;

/// An in-place rewriting pass over a piece of the IR.
pub trait Transform<T> {
    /// Name of the pass.
    fn name(&self) -> &'static str;

    /// Concise description of what the pass does.
    fn description(&self) -> &'static str;

    /// Applies the pass to `ir`.
    fn transform(&self, ir: &mut T) -> Result<()>;
}
