//! Row iteration that is parallel with the `parallel` feature and sequential without it.
//!
//! Algorithms write `(0..rows).into_par_iter()` either way. Without rayon the
//! call resolves to a plain `into_iter()`, so the rest of the chain uses the
//! standard `Iterator` adapters and the output order is the same.

#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
pub use sequential::*;

#[cfg(not(feature = "parallel"))]
mod sequential {
    /// Sequential stand-in for `rayon::prelude::IntoParallelIterator`
    pub trait IntoParallelIterator {
        type Iter: Iterator;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}
