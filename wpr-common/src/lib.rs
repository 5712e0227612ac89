// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod log;

/// Lock a mutex, treating poisoning as fatal. A poisoned table means a
/// thread panicked mid-update and the routing state can no longer be
/// trusted.
#[macro_export]
macro_rules! lock {
    ($mtx:expr) => {
        $mtx.lock().expect("lock mutex")
    };
}
