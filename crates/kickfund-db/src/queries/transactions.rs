use anyhow::{Result, anyhow};
use rusqlite::{Connection, Row};
use tracing::debug;

use kickfund_types::models::{StatsPolicy, TransactionStatus};

use super::OptionalExt;
use super::campaigns::update_campaign;
use crate::Database;
use crate::models::{CampaignPatch, CampaignStats, NewTransaction, TransactionFilter, TransactionRow};

const TRANSACTION_SELECT: &str = "
    SELECT t.id, t.campaign_id, t.user_id, t.amount, t.status, t.code, t.payment_url,
           t.created_at, t.updated_at,
           c.name, c.highlight, u.name, u.email
    FROM transactions t
    JOIN campaigns c ON c.id = t.campaign_id
    JOIN users u ON u.id = t.user_id";

impl Database {
    pub fn list_transactions(&self, filter: TransactionFilter) -> Result<Vec<TransactionRow>> {
        let (campaign_id, user_id) = match filter {
            TransactionFilter::All => (None, None),
            TransactionFilter::Campaign(id) => (Some(id), None),
            TransactionFilter::User(id) => (None, Some(id)),
        };

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE (?1 IS NULL OR t.campaign_id = ?1)
                    AND (?2 IS NULL OR t.user_id = ?2)
                  ORDER BY t.id DESC",
                TRANSACTION_SELECT
            ))?;
            let rows = stmt
                .query_map([campaign_id, user_id], map_transaction)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_transaction(&self, id: i64) -> Result<Option<TransactionRow>> {
        self.with_conn(|conn| query_transaction(conn, id))
    }

    /// Backing flow: insert the ledger entry, recompute the campaign aggregate
    /// and write the new snapshot, all inside one SQLite transaction.
    pub fn record_backing(
        &self,
        new: &NewTransaction<'_>,
        policy: StatsPolicy,
    ) -> Result<(TransactionRow, CampaignStats)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let id = insert_transaction(&tx, new)?;
            let stats = write_snapshot(&tx, new.campaign_id, policy)?;
            let row = query_transaction(&tx, id)?
                .ok_or_else(|| anyhow!("Transaction {} vanished after insert", id))?;

            tx.commit()?;
            Ok((row, stats))
        })
    }

    /// Move a transaction to `paid` and refresh its campaign snapshot in one
    /// SQLite transaction. Re-verifying a paid row rewrites the same status;
    /// nothing ever moves it back to `pending`. `None` when no such row.
    pub fn verify_transaction(
        &self,
        id: i64,
        policy: StatsPolicy,
    ) -> Result<Option<(TransactionRow, CampaignStats)>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let changed = tx.execute(
                "UPDATE transactions SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
                (TransactionStatus::Paid.as_str(), id),
            )?;
            if changed == 0 {
                return Ok(None);
            }
            let row = query_transaction(&tx, id)?
                .ok_or_else(|| anyhow!("Transaction {} vanished after update", id))?;
            let stats = write_snapshot(&tx, row.campaign_id, policy)?;

            tx.commit()?;
            Ok(Some((row, stats)))
        })
    }
}

fn insert_transaction(conn: &Connection, new: &NewTransaction<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions (campaign_id, user_id, amount, status, code, payment_url)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            new.campaign_id,
            new.user_id,
            new.amount,
            TransactionStatus::Pending.as_str(),
            new.code,
            new.payment_url,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn query_transaction(conn: &Connection, id: i64) -> Result<Option<TransactionRow>> {
    conn.query_row(&format!("{} WHERE t.id = ?1", TRANSACTION_SELECT), [id], map_transaction)
        .optional()
}

/// Sum and count of the ledger rows the policy admits for this campaign.
fn campaign_stats(conn: &Connection, campaign_id: i64, policy: StatsPolicy) -> Result<CampaignStats> {
    let sql = match policy {
        StatsPolicy::All => {
            "SELECT COALESCE(SUM(amount), 0), COUNT(*) FROM transactions WHERE campaign_id = ?1"
        }
        StatsPolicy::Paid => {
            "SELECT COALESCE(SUM(amount), 0), COUNT(*) FROM transactions
             WHERE campaign_id = ?1 AND status = 'paid'"
        }
    };

    let stats = conn.query_row(sql, [campaign_id], |row| {
        Ok(CampaignStats {
            current_amount: row.get(0)?,
            backers_count: row.get(1)?,
        })
    })?;
    Ok(stats)
}

/// Recompute the aggregate and persist it on the campaign row. Callers run this
/// inside the transaction that changed the ledger.
fn write_snapshot(conn: &Connection, campaign_id: i64, policy: StatsPolicy) -> Result<CampaignStats> {
    let stats = campaign_stats(conn, campaign_id, policy)?;
    if !update_campaign(conn, campaign_id, &CampaignPatch::from(stats))? {
        return Err(anyhow!("Campaign {} not found while writing its snapshot", campaign_id));
    }
    debug!(
        "Campaign {} snapshot: amount={} backers={}",
        campaign_id, stats.current_amount, stats.backers_count
    );
    Ok(stats)
}

fn map_transaction(row: &Row<'_>) -> rusqlite::Result<TransactionRow> {
    Ok(TransactionRow {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        user_id: row.get(2)?,
        amount: row.get(3)?,
        status: row.get(4)?,
        code: row.get(5)?,
        payment_url: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        campaign_name: row.get(9)?,
        campaign_highlight: row.get(10)?,
        user_name: row.get(11)?,
        user_email: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use crate::models::{CampaignStats, NewCampaign, NewTransaction, NewUser, TransactionFilter};
    use kickfund_types::models::StatsPolicy;

    struct Fixture {
        db: Database,
        owner: i64,
        backer: i64,
        campaign: i64,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let owner = db
            .create_user(&NewUser {
                name: "Owner",
                occupation: "Maker",
                email: "owner@x.com",
                password_hash: "hash",
            })
            .unwrap()
            .unwrap();
        let backer = db
            .create_user(&NewUser {
                name: "Backer",
                occupation: "Patron",
                email: "backer@x.com",
                password_hash: "hash",
            })
            .unwrap()
            .unwrap();
        let campaign = db
            .create_campaign(&NewCampaign {
                user_id: owner,
                name: "Library",
                slug: "1-library",
                highlight: "Books",
                description: "More books",
                perks: "Bookmark",
                goal_amount: 100_000,
            })
            .unwrap();
        Fixture { db, owner, backer, campaign }
    }

    fn back(f: &Fixture, user_id: i64, amount: i64, policy: StatsPolicy) -> CampaignStats {
        let code = format!("TRX-{}", amount);
        f.db.record_backing(
            &NewTransaction {
                campaign_id: f.campaign,
                user_id,
                amount,
                code: &code,
                payment_url: None,
            },
            policy,
        )
        .unwrap()
        .1
    }

    #[test]
    fn backing_updates_snapshot_with_sum_and_count() {
        let f = fixture();
        let amounts = [20_000, 30_000, 1, 999];
        for amount in amounts {
            back(&f, f.backer, amount, StatsPolicy::All);
        }

        let row = f.db.get_campaign(f.campaign).unwrap().unwrap();
        assert_eq!(row.current_amount, amounts.iter().sum::<i64>());
        assert_eq!(row.backers_count, amounts.len() as i64);
    }

    #[test]
    fn new_transactions_are_pending_and_verify_moves_forward() {
        let f = fixture();
        back(&f, f.backer, 500, StatsPolicy::All);

        let tx = &f.db.list_transactions(TransactionFilter::All).unwrap()[0];
        assert_eq!(tx.status, "pending");
        assert_eq!(tx.campaign_name, "Library");
        assert_eq!(tx.user_email, "backer@x.com");

        let (paid, stats) = f.db.verify_transaction(tx.id, StatsPolicy::All).unwrap().unwrap();
        assert_eq!(paid.status, "paid");
        assert_eq!(stats, CampaignStats { current_amount: 500, backers_count: 1 });
        let (again, _) = f.db.verify_transaction(tx.id, StatsPolicy::All).unwrap().unwrap();
        assert_eq!(again.status, "paid");

        assert!(f.db.verify_transaction(tx.id + 10, StatsPolicy::All).unwrap().is_none());
    }

    #[test]
    fn paid_policy_counts_rows_once_verified() {
        let f = fixture();
        back(&f, f.backer, 100, StatsPolicy::Paid);
        let stats = back(&f, f.owner, 200, StatsPolicy::Paid);
        assert_eq!(stats, CampaignStats::default());

        let ledger = f.db.list_transactions(TransactionFilter::Campaign(f.campaign)).unwrap();
        assert_eq!(ledger.len(), 2);
        let oldest = ledger.iter().min_by_key(|t| t.id).unwrap();

        let (_, refreshed) = f.db.verify_transaction(oldest.id, StatsPolicy::Paid).unwrap().unwrap();
        assert_eq!(refreshed, CampaignStats { current_amount: 100, backers_count: 1 });
        let row = f.db.get_campaign(f.campaign).unwrap().unwrap();
        assert_eq!((row.current_amount, row.backers_count), (100, 1));
    }

    #[test]
    fn verify_rolls_back_when_snapshot_write_fails() {
        let f = fixture();
        back(&f, f.backer, 100, StatsPolicy::Paid);
        let id = f.db.list_transactions(TransactionFilter::All).unwrap()[0].id;

        f.db.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER freeze_campaigns BEFORE UPDATE ON campaigns
                 BEGIN SELECT RAISE(ABORT, 'campaigns are frozen'); END;",
            )?;
            Ok(())
        })
        .unwrap();

        assert!(f.db.verify_transaction(id, StatsPolicy::Paid).is_err());
        let tx = f.db.get_transaction(id).unwrap().unwrap();
        assert_eq!(tx.status, "pending");
        let row = f.db.get_campaign(f.campaign).unwrap().unwrap();
        assert_eq!((row.current_amount, row.backers_count), (0, 0));
    }

    #[test]
    fn listing_filters_by_campaign_or_user() {
        let f = fixture();
        back(&f, f.backer, 10, StatsPolicy::All);
        back(&f, f.owner, 20, StatsPolicy::All);

        assert_eq!(f.db.list_transactions(TransactionFilter::All).unwrap().len(), 2);
        assert_eq!(
            f.db.list_transactions(TransactionFilter::Campaign(f.campaign)).unwrap().len(),
            2
        );
        let mine = f.db.list_transactions(TransactionFilter::User(f.backer)).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].amount, 10);
        assert!(
            f.db.list_transactions(TransactionFilter::Campaign(f.campaign + 1))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn failed_backing_leaves_no_ledger_entry() {
        let f = fixture();
        let result = f.db.record_backing(
            &NewTransaction {
                campaign_id: f.campaign,
                user_id: f.backer,
                amount: 0,
                code: "TRX-zero",
                payment_url: None,
            },
            StatsPolicy::All,
        );
        assert!(result.is_err());
        assert!(f.db.list_transactions(TransactionFilter::All).unwrap().is_empty());
        let row = f.db.get_campaign(f.campaign).unwrap().unwrap();
        assert_eq!(row.backers_count, 0);
    }

    #[test]
    fn aggregate_overflow_rolls_back_the_backing() {
        let f = fixture();
        back(&f, f.backer, i64::MAX, StatsPolicy::All);

        let result = f.db.record_backing(
            &NewTransaction {
                campaign_id: f.campaign,
                user_id: f.owner,
                amount: 1,
                code: "TRX-one",
                payment_url: Some("https://pay.example/TRX-one"),
            },
            StatsPolicy::All,
        );
        assert!(result.is_err());
        assert_eq!(f.db.list_transactions(TransactionFilter::All).unwrap().len(), 1);
        let row = f.db.get_campaign(f.campaign).unwrap().unwrap();
        assert_eq!((row.current_amount, row.backers_count), (i64::MAX, 1));
    }
}
