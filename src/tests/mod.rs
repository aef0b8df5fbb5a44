// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod fakes;
pub mod state_tests;
pub mod clock_tests;
pub mod snapshot_tests;
