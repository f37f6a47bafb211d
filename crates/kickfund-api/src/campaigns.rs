use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::{error, info};
use uuid::Uuid;

use kickfund_db::models::{
    CampaignImageRow, CampaignPatch, CampaignRow, DeleteOutcome, NewCampaign, parse_timestamp,
};
use kickfund_types::api::{
    CampaignImageResponse, CampaignListQuery, CampaignResponse, CampaignThumbnail,
    CampaignUserSnippet, CreateCampaignRequest, UpdateCampaignRequest, UploadImagesResponse,
};

use crate::error::{ApiError, respond};
use crate::middleware::Principal;
use crate::state::{AppState, with_db};
use crate::storage::{UploadForm, public_url};

const CAMPAIGN_NOT_FOUND: &str = "Campaign not found.";
const NOT_CAMPAIGN_OWNER: &str = "You are not allowed to modify this campaign.";

/// GET /campaigns, optionally `?user_id=` to list one owner's campaigns.
pub async fn list_campaigns(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<CampaignListQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = with_db(&state, move |db| db.list_campaigns(query.user_id)).await?;
    Ok(respond(StatusCode::OK, "Ok", "success", thumbnails(rows)))
}

/// GET /me/campaigns
pub async fn list_own_campaigns(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    let owner = principal.id();
    let rows = with_db(&state, move |db| db.list_campaigns(Some(owner))).await?;
    Ok(respond(StatusCode::OK, "Ok", "success", thumbnails(rows)))
}

pub async fn get_campaign(
    State(state): State<AppState>,
    WithRejection(Path(campaign_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = load_detail(&state, campaign_id).await?;
    Ok(respond(StatusCode::OK, "Ok", "success", detail))
}

pub async fn create_campaign(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Json(req), _): WithRejection<Json<CreateCampaignRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    ApiError::check(req.field_errors())?;

    let owner = principal.id();
    let slug = slugify(&format!("{} {}", owner, req.name));
    let campaign_id = with_db(&state, move |db| {
        db.create_campaign(&NewCampaign {
            user_id: owner,
            name: req.name.trim(),
            slug: &slug,
            highlight: &req.highlight,
            description: &req.description,
            perks: &req.perks,
            goal_amount: req.goal_amount,
        })
    })
    .await?;
    info!("User {} created campaign {}", owner, campaign_id);

    let detail = load_detail(&state, campaign_id).await?;
    Ok(respond(StatusCode::CREATED, "Campaign created.", "created", detail))
}

/// PATCH /campaigns/{id}: owner only. Absent fields keep their stored value.
pub async fn update_campaign(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Path(campaign_id), _): WithRejection<Path<i64>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateCampaignRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    owned_campaign(&state, campaign_id, &principal).await?;
    ApiError::check(req.field_errors())?;

    let patch = CampaignPatch {
        name: req.name.map(|name| name.trim().to_string()),
        highlight: req.highlight,
        description: req.description,
        perks: req.perks,
        goal_amount: req.goal_amount,
        ..CampaignPatch::default()
    };
    let updated = with_db(&state, move |db| db.update_campaign(campaign_id, &patch)).await?;
    if !updated {
        return Err(ApiError::NotFound(CAMPAIGN_NOT_FOUND));
    }

    let detail = load_detail(&state, campaign_id).await?;
    Ok(respond(StatusCode::OK, "Campaign updated.", "updated", detail))
}

/// DELETE /campaigns/{id}: owner only, and only while nobody has backed it.
pub async fn delete_campaign(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Path(campaign_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    owned_campaign(&state, campaign_id, &principal).await?;

    match with_db(&state, move |db| db.delete_campaign(campaign_id)).await? {
        DeleteOutcome::Deleted { image_keys } => {
            state.storage.discard(&image_keys).await;
            info!("User {} deleted campaign {}", principal.id(), campaign_id);
            Ok(respond(StatusCode::OK, "Campaign deleted.", "deleted", ()))
        }
        DeleteOutcome::HasTransactions => {
            Err(ApiError::Conflict("Campaign already has backers and cannot be deleted."))
        }
        DeleteOutcome::NotFound => Err(ApiError::NotFound(CAMPAIGN_NOT_FOUND)),
    }
}

/// POST /campaigns/{id}/images: multipart with repeated `images` files and a
/// `cover_index` field naming which of them becomes the cover.
pub async fn upload_images(
    State(state): State<AppState>,
    principal: Principal,
    WithRejection(Path(campaign_id), _): WithRejection<Path<i64>, ApiError>,
    WithRejection(multipart, _): WithRejection<Multipart, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    owned_campaign(&state, campaign_id, &principal).await?;

    let form = UploadForm::read(multipart).await?;
    let images = form.images("images")?;
    if images.is_empty() {
        return Err(ApiError::invalid("at least one image is required"));
    }
    let cover_index = form
        .fields
        .get("cover_index")
        .ok_or_else(|| ApiError::invalid("cover_index is required"))?
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|index| *index < images.len())
        .ok_or_else(|| {
            ApiError::invalid(format!("cover_index must be between 0 and {}", images.len() - 1))
        })?;

    let mut keys = Vec::with_capacity(images.len());
    for (file, ext) in &images {
        let key = format!("campaigns/img-{}-{}{}", campaign_id, Uuid::new_v4().simple(), ext);
        if let Err(e) = state.storage.store(&key, &file.bytes).await {
            state.storage.discard(&keys).await;
            return Err(e.into());
        }
        keys.push(key);
    }

    let stored = keys.clone();
    let rows = match with_db(&state, move |db| {
        db.replace_campaign_images(campaign_id, &stored, cover_index)
    })
    .await
    {
        Ok(rows) => rows,
        Err(e) => {
            error!("Saving images for campaign {} failed, removing stored files", campaign_id);
            state.storage.discard(&keys).await;
            return Err(e);
        }
    };
    info!("Campaign {} received {} images (cover #{})", campaign_id, rows.len(), cover_index);

    Ok(respond(
        StatusCode::CREATED,
        "Campaign images uploaded.",
        "created",
        UploadImagesResponse { images: rows.iter().map(image_response).collect() },
    ))
}

/// Loads the campaign and checks the principal owns it.
async fn owned_campaign(
    state: &AppState,
    campaign_id: i64,
    principal: &Principal,
) -> Result<CampaignRow, ApiError> {
    let campaign = with_db(state, move |db| db.get_campaign(campaign_id))
        .await?
        .ok_or(ApiError::NotFound(CAMPAIGN_NOT_FOUND))?;

    if campaign.user_id != principal.id() {
        return Err(ApiError::Unauthorized(NOT_CAMPAIGN_OWNER));
    }
    Ok(campaign)
}

async fn load_detail(state: &AppState, campaign_id: i64) -> Result<CampaignResponse, ApiError> {
    let (row, images) = with_db(state, move |db| {
        let Some(row) = db.get_campaign(campaign_id)? else {
            return Ok(None);
        };
        let images = db.get_campaign_images(campaign_id)?;
        Ok(Some((row, images)))
    })
    .await?
    .ok_or(ApiError::NotFound(CAMPAIGN_NOT_FOUND))?;

    Ok(campaign_response(row, &images))
}

fn campaign_response(row: CampaignRow, images: &[CampaignImageRow]) -> CampaignResponse {
    let cover = images.iter().find(|image| image.is_cover).map(|image| image.filename.as_str());

    CampaignResponse {
        id: row.id,
        user_id: row.user_id,
        cover_image: public_url(cover),
        images: images.iter().map(image_response).collect(),
        user: CampaignUserSnippet {
            id: row.user_id,
            name: row.owner_name,
            avatar: public_url(row.owner_avatar.as_deref()),
        },
        created_at: parse_timestamp(&row.created_at),
        name: row.name,
        slug: row.slug,
        highlight: row.highlight,
        description: row.description,
        perks: row.perks,
        goal_amount: row.goal_amount,
        current_amount: row.current_amount,
        backers_count: row.backers_count,
    }
}

fn thumbnails(rows: Vec<CampaignRow>) -> Vec<CampaignThumbnail> {
    rows.into_iter()
        .map(|row| CampaignThumbnail {
            id: row.id,
            user_id: row.user_id,
            image: public_url(row.image.as_deref()),
            created_at: parse_timestamp(&row.created_at),
            name: row.name,
            slug: row.slug,
            highlight: row.highlight,
            goal_amount: row.goal_amount,
            current_amount: row.current_amount,
            backers_count: row.backers_count,
        })
        .collect()
}

fn image_response(image: &CampaignImageRow) -> CampaignImageResponse {
    CampaignImageResponse {
        url: public_url(Some(&image.filename)),
        is_cover: image.is_cover,
    }
}

/// Lowercase ASCII slug; every run of other characters becomes a single `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
