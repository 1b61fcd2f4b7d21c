// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Content Generation Infrastructure - Anti-Corruption Layer Implementations
//
// Each adapter translates between the domain ContentGenerator interface and
// an external API. FallbackGenerator wraps an optional adapter so callers
// always get text back.

pub mod fallback;
pub mod openai;

pub use fallback::FallbackGenerator;
pub use openai::OpenAIGenerator;
