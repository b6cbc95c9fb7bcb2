//! Unit tests for node-local persistent task execution.
