use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! declare_row_id {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(
                Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
            )]
            #[serde(transparent)]
            pub struct $name(pub i64);

            impl $name {
                pub const fn new(raw: i64) -> Self {
                    Self(raw)
                }

                pub const fn get(self) -> i64 {
                    self.0
                }
            }

            impl From<i64> for $name {
                fn from(raw: i64) -> Self {
                    Self(raw)
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    self.0.fmt(f)
                }
            }
        )+
    };
}

declare_row_id!(
    /// Row identifier of a performer.
    PerformerId,
    /// Row identifier of a tag.
    TagId,
    /// Row identifier of a scene.
    SceneId,
    /// Row identifier of a movie.
    MovieId,
);
