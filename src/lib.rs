// calltext: embeddable template/expression interpreter.
//
// Copyright (C) 2019  Brandon Lewis
//
// This program is free software: you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public License
// as published by the Free Software Foundation, either version 3 of
// the License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this program.  If not, see
// <https://www.gnu.org/licenses/>.

pub mod error;
pub mod options;
pub mod parser;
pub mod registry;
pub mod scope;
pub mod value;

pub use error::{ControlFlow, Error};
pub use options::Options;
pub use parser::Segment;
pub use registry::{Callable, FunctionDef};
pub use scope::{CallFrame, Scope};
pub use value::{NumericPair, Value, ValueTag};
