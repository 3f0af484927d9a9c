//! Field resolution for performers.
//!
//! Each field picks the cheapest source that can answer it: the base row, an
//! association slot, a batching loader, or one scoped read. A field's failure
//! stays with that field; [`PerformerResolver::resolve_fields`] always returns
//! every requested field.

use std::fmt;
use std::str::FromStr;

use futures::future::join_all;
use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;
use weft_types::{Movie, PerformerId, Scene, StashId, Tag, TagId, rating100_to_5};

use crate::context::RequestContext;
use crate::error::{WeftError, WeftResult};
use crate::performer::Performer;
use crate::repo::Repository;
use crate::url::performer_image_url;

const ALIAS_SEPARATOR: &str = ", ";
const DATE_FORMAT: &str = "%Y-%m-%d";

macro_rules! performer_fields {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// A field a client can request on a performer.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        #[serde(rename_all = "snake_case")]
        pub enum PerformerField {
            $($variant),+
        }

        impl PerformerField {
            pub const ALL: &'static [PerformerField] = &[$(PerformerField::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(PerformerField::$variant => $name),+
                }
            }
        }

        impl FromStr for PerformerField {
            type Err = UnknownField;

            fn from_str(s: &str) -> Result<Self, UnknownField> {
                match s {
                    $($name => Ok(PerformerField::$variant),)+
                    other => Err(UnknownField(other.to_string())),
                }
            }
        }
    };
}

performer_fields! {
    Id => "id",
    Name => "name",
    Disambiguation => "disambiguation",
    Favorite => "favorite",
    Checksum => "checksum",
    Aliases => "aliases",
    AliasList => "alias_list",
    Height => "height",
    HeightCm => "height_cm",
    Birthdate => "birthdate",
    DeathDate => "death_date",
    Rating => "rating",
    Rating100 => "rating100",
    ImagePath => "image_path",
    Tags => "tags",
    StashIds => "stash_ids",
    SceneCount => "scene_count",
    ImageCount => "image_count",
    GalleryCount => "gallery_count",
    MovieCount => "movie_count",
    Scenes => "scenes",
    Movies => "movies",
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown performer field `{0}`")]
pub struct UnknownField(pub String);

impl fmt::Display for PerformerField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved field in its external shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    TextList(Vec<String>),
    Tags(Vec<Tag>),
    StashIds(Vec<StashId>),
    Scenes(Vec<Scene>),
    Movies(Vec<Movie>),
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Null, Self::Text)
    }
}

impl From<Option<i32>> for FieldValue {
    fn from(value: Option<i32>) -> Self {
        value.map_or(Self::Null, |v| Self::Int(i64::from(v)))
    }
}

/// Per-field outcomes for one performer, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldResults {
    entries: Vec<(PerformerField, WeftResult<FieldValue>)>,
}

impl FieldResults {
    pub fn get(&self, field: PerformerField) -> Option<&WeftResult<FieldValue>> {
        self.entries
            .iter()
            .find(|(requested, _)| *requested == field)
            .map(|(_, outcome)| outcome)
    }

    pub fn value(&self, field: PerformerField) -> Option<&FieldValue> {
        self.get(field).and_then(|outcome| outcome.as_ref().ok())
    }

    pub fn error(&self, field: PerformerField) -> Option<&WeftError> {
        self.get(field).and_then(|outcome| outcome.as_ref().err())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(PerformerField, WeftResult<FieldValue>)> {
        self.entries.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = (PerformerField, &WeftError)> {
        self.entries
            .iter()
            .filter_map(|(field, outcome)| outcome.as_ref().err().map(|err| (*field, err)))
    }

    /// `{"data": {...}, "errors": [...]}`: failed fields are `null` in `data`
    /// and listed with their message in `errors`.
    pub fn to_json(&self) -> Value {
        let mut data = Map::new();
        let mut errors = Vec::new();
        for (field, outcome) in &self.entries {
            let rendered = match outcome {
                Ok(value) => serde_json::to_value(value)
                    .map_err(|error| format!("serialize {field}: {error}")),
                Err(err) => Err(err.to_string()),
            };
            let value = rendered.unwrap_or_else(|message| {
                errors.push(json!({ "field": field.as_str(), "message": message }));
                Value::Null
            });
            data.insert(field.as_str().to_string(), value);
        }
        json!({ "data": data, "errors": errors })
    }
}

pub struct PerformerResolver<'a, R: Repository> {
    ctx: &'a RequestContext<R>,
}

impl<'a, R: Repository> PerformerResolver<'a, R> {
    pub fn new(ctx: &'a RequestContext<R>) -> Self {
        Self { ctx }
    }

    /// Loads `ids` through the request's performer loader and resolves
    /// `fields` on each, all concurrently. Results follow `ids`; `Ok(None)`
    /// marks an id with no performer.
    pub async fn resolve_many(
        &self,
        ids: &[PerformerId],
        fields: &[PerformerField],
    ) -> Vec<WeftResult<Option<FieldResults>>> {
        let performers = self.ctx.loaders().performer_by_id.load_all(ids).await;
        join_all(performers.into_iter().map(|outcome| async move {
            match outcome? {
                Some(performer) => Ok(Some(self.resolve_fields(&performer, fields).await)),
                None => Ok(None),
            }
        }))
        .await
    }

    pub async fn resolve_fields(&self, obj: &Performer, fields: &[PerformerField]) -> FieldResults {
        let entries = join_all(
            fields
                .iter()
                .map(|field| async move { (*field, self.resolve(obj, *field).await) }),
        )
        .await;
        FieldResults { entries }
    }

    pub async fn resolve(&self, obj: &Performer, field: PerformerField) -> WeftResult<FieldValue> {
        Ok(match field {
            PerformerField::Id => FieldValue::Int(obj.id().get()),
            PerformerField::Name => FieldValue::Text(obj.name.clone()),
            PerformerField::Disambiguation => obj.disambiguation.clone().into(),
            PerformerField::Favorite => FieldValue::Bool(obj.favorite),
            PerformerField::Checksum => self.checksum(obj).into(),
            PerformerField::Aliases => self.aliases(obj).await?.into(),
            PerformerField::AliasList => FieldValue::TextList(self.alias_list(obj).await?),
            PerformerField::Height => self.height(obj).into(),
            PerformerField::HeightCm => self.height_cm(obj).into(),
            PerformerField::Birthdate => self.birthdate(obj).into(),
            PerformerField::DeathDate => self.death_date(obj).into(),
            PerformerField::Rating => self.rating(obj).into(),
            PerformerField::Rating100 => self.rating100(obj).into(),
            PerformerField::ImagePath => FieldValue::Text(self.image_path(obj)),
            PerformerField::Tags => FieldValue::Tags(self.tags(obj).await?),
            PerformerField::StashIds => FieldValue::StashIds(self.stash_ids(obj).await?),
            PerformerField::SceneCount => FieldValue::Int(self.scene_count(obj).await?),
            PerformerField::ImageCount => FieldValue::Int(self.image_count(obj).await?),
            PerformerField::GalleryCount => FieldValue::Int(self.gallery_count(obj).await?),
            PerformerField::MovieCount => FieldValue::Int(self.movie_count(obj).await?),
            PerformerField::Scenes => FieldValue::Scenes(self.scenes(obj).await?),
            PerformerField::Movies => FieldValue::Movies(self.movies(obj).await?),
        })
    }

    /// Deprecated; always absent.
    pub fn checksum(&self, _obj: &Performer) -> Option<String> {
        None
    }

    pub async fn aliases(&self, obj: &Performer) -> WeftResult<Option<String>> {
        let aliases = self.ensure_aliases(obj).await?;
        Ok(Some(aliases.join(ALIAS_SEPARATOR)))
    }

    pub async fn alias_list(&self, obj: &Performer) -> WeftResult<Vec<String>> {
        Ok(self.ensure_aliases(obj).await?.to_vec())
    }

    pub fn height(&self, obj: &Performer) -> Option<String> {
        obj.height_cm.map(|height| height.to_string())
    }

    pub fn height_cm(&self, obj: &Performer) -> Option<i32> {
        obj.height_cm
    }

    pub fn birthdate(&self, obj: &Performer) -> Option<String> {
        obj.birthdate
            .map(|date| date.format(DATE_FORMAT).to_string())
    }

    pub fn death_date(&self, obj: &Performer) -> Option<String> {
        obj.death_date
            .map(|date| date.format(DATE_FORMAT).to_string())
    }

    pub fn rating(&self, obj: &Performer) -> Option<i32> {
        obj.rating100.map(rating100_to_5)
    }

    pub fn rating100(&self, obj: &Performer) -> Option<i32> {
        obj.rating100
    }

    pub fn image_path(&self, obj: &Performer) -> String {
        performer_image_url(self.ctx.base_url(), obj.record())
    }

    /// Tags in the order of the performer's tag ids. Ids whose tag no longer
    /// exists are skipped.
    pub async fn tags(&self, obj: &Performer) -> WeftResult<Vec<Tag>> {
        // Siblings' tag lookups stay open until these keys are registered.
        let lookup = self.ctx.lookups().enter("performer.tags");
        let tag_ids = self.ensure_tag_ids(obj).await?;
        let pending = self.ctx.loaders().tag_by_id.load_all(tag_ids);
        drop(lookup);
        let outcomes = pending.await;
        let mut tags = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            if let Some(tag) = outcome? {
                tags.push(tag);
            }
        }
        Ok(tags)
    }

    pub async fn stash_ids(&self, obj: &Performer) -> WeftResult<Vec<StashId>> {
        Ok(self.ensure_stash_ids(obj).await?.to_vec())
    }

    pub async fn scene_count(&self, obj: &Performer) -> WeftResult<i64> {
        let count = self
            .ctx
            .loaders()
            .scene_count_by_performer
            .load(obj.id())
            .await?;
        Ok(count.unwrap_or(0))
    }

    pub async fn image_count(&self, obj: &Performer) -> WeftResult<i64> {
        let (repo, id) = (self.ctx.repo(), obj.id());
        self.ctx
            .read(|scope| async move { repo.count_images_by_performer(&scope, id).await })
            .await
    }

    pub async fn gallery_count(&self, obj: &Performer) -> WeftResult<i64> {
        let (repo, id) = (self.ctx.repo(), obj.id());
        self.ctx
            .read(|scope| async move { repo.count_galleries_by_performer(&scope, id).await })
            .await
    }

    pub async fn movie_count(&self, obj: &Performer) -> WeftResult<i64> {
        let (repo, id) = (self.ctx.repo(), obj.id());
        self.ctx
            .read(|scope| async move { repo.count_movies_by_performer(&scope, id).await })
            .await
    }

    pub async fn scenes(&self, obj: &Performer) -> WeftResult<Vec<Scene>> {
        let (repo, id) = (self.ctx.repo(), obj.id());
        self.ctx
            .read(|scope| async move { repo.find_scenes_by_performer(&scope, id).await })
            .await
    }

    pub async fn movies(&self, obj: &Performer) -> WeftResult<Vec<Movie>> {
        let (repo, id) = (self.ctx.repo(), obj.id());
        self.ctx
            .read(|scope| async move { repo.find_movies_by_performer(&scope, id).await })
            .await
    }

    // The snapshot is opened inside the slot's initializer, so concurrent
    // first accesses share one read and one snapshot.
    async fn ensure_aliases<'p>(&self, obj: &'p Performer) -> WeftResult<&'p [String]> {
        let (repo, id) = (self.ctx.repo(), obj.id());
        obj.aliases()
            .ensure(|| {
                self.ctx
                    .read(|scope| async move { repo.performer_aliases(&scope, id).await })
            })
            .await
            .map(Vec::as_slice)
    }

    async fn ensure_tag_ids<'p>(&self, obj: &'p Performer) -> WeftResult<&'p [TagId]> {
        let (repo, id) = (self.ctx.repo(), obj.id());
        obj.tag_ids()
            .ensure(|| {
                self.ctx
                    .read(|scope| async move { repo.performer_tag_ids(&scope, id).await })
            })
            .await
            .map(Vec::as_slice)
    }

    async fn ensure_stash_ids<'p>(&self, obj: &'p Performer) -> WeftResult<&'p [StashId]> {
        let (repo, id) = (self.ctx.repo(), obj.id());
        obj.stash_ids()
            .ensure(|| {
                self.ctx
                    .read(|scope| async move { repo.performer_stash_ids(&scope, id).await })
            })
            .await
            .map(Vec::as_slice)
    }
}
