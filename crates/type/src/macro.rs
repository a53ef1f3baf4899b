// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

/// Wraps a [`crate::diagnostic::Diagnostic`] into an [`crate::Error`].
#[macro_export]
macro_rules! error {
	($diagnostic:expr) => {
		$crate::Error($diagnostic)
	};
}

/// Returns early with an [`crate::Error`] built from a diagnostic.
#[macro_export]
macro_rules! err {
	($diagnostic:expr) => {
		return Err($crate::error!($diagnostic))
	};
}
