use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::Database;
use crate::models::{CampaignImageRow, CampaignPatch, CampaignRow, DeleteOutcome, NewCampaign};

// Owner snippet and representative image come along in the same query (no N+1).
const CAMPAIGN_SELECT: &str = "
    SELECT c.id, c.user_id, c.name, c.slug, c.highlight, c.description, c.perks,
           c.goal_amount, c.current_amount, c.backers_count, c.created_at, c.updated_at,
           u.name, u.avatar,
           (SELECT ci.filename FROM campaign_images ci
             WHERE ci.campaign_id = c.id
             ORDER BY ci.is_cover DESC, ci.id ASC
             LIMIT 1)
    FROM campaigns c
    JOIN users u ON u.id = c.user_id";

impl Database {
    pub fn list_campaigns(&self, owner_id: Option<i64>) -> Result<Vec<CampaignRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE (?1 IS NULL OR c.user_id = ?1) ORDER BY c.id DESC",
                CAMPAIGN_SELECT
            ))?;
            let rows = stmt
                .query_map([owner_id], map_campaign)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_campaign(&self, id: i64) -> Result<Option<CampaignRow>> {
        self.with_conn(|conn| query_campaign(conn, id))
    }

    pub fn get_campaign_images(&self, campaign_id: i64) -> Result<Vec<CampaignImageRow>> {
        self.with_conn(|conn| get_campaign_images(conn, campaign_id))
    }

    pub fn create_campaign(&self, campaign: &NewCampaign<'_>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO campaigns (user_id, name, slug, highlight, description, perks, goal_amount)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    campaign.user_id,
                    campaign.name,
                    campaign.slug,
                    campaign.highlight,
                    campaign.description,
                    campaign.perks,
                    campaign.goal_amount,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Apply a field-level patch. Returns false when no campaign has this id.
    pub fn update_campaign(&self, id: i64, patch: &CampaignPatch) -> Result<bool> {
        self.with_conn(|conn| update_campaign(conn, id, patch))
    }

    pub fn delete_campaign(&self, id: i64) -> Result<DeleteOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let exists = tx
                .query_row("SELECT 1 FROM campaigns WHERE id = ?1", [id], |row| row.get::<_, i64>(0))
                .optional()?
                .is_some();
            if !exists {
                return Ok(DeleteOutcome::NotFound);
            }

            let backed: i64 =
                tx.query_row("SELECT COUNT(*) FROM transactions WHERE campaign_id = ?1", [id], |row| {
                    row.get(0)
                })?;
            if backed > 0 {
                return Ok(DeleteOutcome::HasTransactions);
            }

            let image_keys = get_campaign_images(&tx, id)?
                .into_iter()
                .map(|image| image.filename)
                .collect();

            // campaign_images rows go with it (ON DELETE CASCADE)
            tx.execute("DELETE FROM campaigns WHERE id = ?1", [id])?;
            tx.commit()?;

            Ok(DeleteOutcome::Deleted { image_keys })
        })
    }

    /// Clear every cover flag of the campaign and insert the new batch, with the
    /// `cover_index`-th file flagged as cover. Both steps commit together.
    pub fn replace_campaign_images(
        &self,
        campaign_id: i64,
        filenames: &[String],
        cover_index: usize,
    ) -> Result<Vec<CampaignImageRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            reset_cover_flags(&tx, campaign_id)?;
            let rows = insert_campaign_images(&tx, campaign_id, filenames, cover_index)?;
            tx.commit()?;
            Ok(rows)
        })
    }
}

fn query_campaign(conn: &Connection, id: i64) -> Result<Option<CampaignRow>> {
    conn.query_row(&format!("{} WHERE c.id = ?1", CAMPAIGN_SELECT), [id], map_campaign)
        .optional()
}

pub(super) fn update_campaign(conn: &Connection, id: i64, patch: &CampaignPatch) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE campaigns SET
            name           = COALESCE(?1, name),
            highlight      = COALESCE(?2, highlight),
            description    = COALESCE(?3, description),
            perks          = COALESCE(?4, perks),
            goal_amount    = COALESCE(?5, goal_amount),
            current_amount = COALESCE(?6, current_amount),
            backers_count  = COALESCE(?7, backers_count),
            updated_at     = datetime('now')
         WHERE id = ?8",
        rusqlite::params![
            patch.name,
            patch.highlight,
            patch.description,
            patch.perks,
            patch.goal_amount,
            patch.current_amount,
            patch.backers_count,
            id,
        ],
    )?;
    Ok(changed > 0)
}

fn get_campaign_images(conn: &Connection, campaign_id: i64) -> Result<Vec<CampaignImageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, campaign_id, filename, is_cover, created_at
         FROM campaign_images
         WHERE campaign_id = ?1
         ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map([campaign_id], map_image)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Returns the number of images that lost their cover flag.
fn reset_cover_flags(conn: &Connection, campaign_id: i64) -> Result<usize> {
    let cleared = conn.execute(
        "UPDATE campaign_images SET is_cover = 0, updated_at = datetime('now')
         WHERE campaign_id = ?1 AND is_cover = 1",
        [campaign_id],
    )?;
    Ok(cleared)
}

fn insert_campaign_images(
    conn: &Connection,
    campaign_id: i64,
    filenames: &[String],
    cover_index: usize,
) -> Result<Vec<CampaignImageRow>> {
    let mut insert = conn.prepare(
        "INSERT INTO campaign_images (campaign_id, filename, is_cover) VALUES (?1, ?2, ?3)",
    )?;
    let mut ids = Vec::with_capacity(filenames.len());
    for (i, filename) in filenames.iter().enumerate() {
        insert.execute(rusqlite::params![campaign_id, filename, i == cover_index])?;
        ids.push(conn.last_insert_rowid());
    }

    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        let row = conn.query_row(
            "SELECT id, campaign_id, filename, is_cover, created_at FROM campaign_images WHERE id = ?1",
            [id],
            map_image,
        )?;
        rows.push(row);
    }
    Ok(rows)
}

fn map_campaign(row: &Row<'_>) -> rusqlite::Result<CampaignRow> {
    Ok(CampaignRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        slug: row.get(3)?,
        highlight: row.get(4)?,
        description: row.get(5)?,
        perks: row.get(6)?,
        goal_amount: row.get(7)?,
        current_amount: row.get(8)?,
        backers_count: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        owner_name: row.get(12)?,
        owner_avatar: row.get(13)?,
        image: row.get(14)?,
    })
}

fn map_image(row: &Row<'_>) -> rusqlite::Result<CampaignImageRow> {
    Ok(CampaignImageRow {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        filename: row.get(2)?,
        is_cover: row.get(3)?,
        created_at: row.get(4)?,
    })
}
