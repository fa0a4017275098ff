//! Crate-level error types.
//!
//! Almost every failure in this core is absorbed locally (defaults, logged
//! no-ops); checkout is the one operation whose rejection the caller must
//! see.

/// Error returned when submitting an order fails.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// Checkout was attempted with no items in the cart. No order is
    /// created and the order store is left untouched.
    #[error("cannot submit an order from an empty cart")]
    EmptyCart,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cart_display() {
        assert_eq!(
            SubmitError::EmptyCart.to_string(),
            "cannot submit an order from an empty cart"
        );
    }

    // Verify `Send + Sync` bounds are satisfied so the error can cross
    // task boundaries.
    const _: () = {
        #[allow(dead_code)]
        fn assert_send_sync<T: Send + Sync>() {}

        #[allow(dead_code)]
        fn check() {
            assert_send_sync::<SubmitError>();
        }
    };
}
