// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Oracle validation: schema evaluation plus deep output comparison.

mod compare;
mod schema;
mod validator;

pub use compare::compare_values;
pub use schema::SchemaCache;
pub use validator::{OracleValidator, ValidateError};
