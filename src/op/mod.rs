// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The request-lifecycle value object (§4.G).

pub mod operator;

pub use operator::Operator;
