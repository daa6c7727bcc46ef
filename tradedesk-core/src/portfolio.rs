//! Accounts, funding, KYC and introducing-broker applications for the
//! signed-in user.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::api::DeskApi;
use crate::error::{DeskError, DeskResult};
use crate::models::{
    new_id, Account, DashboardOverview, IbRequest, KycDocument, KycStatus, NewAccount,
    Transaction, TransactionKind, TransactionQuery, IB_UNDER_REVIEW,
};
use crate::session::SessionContext;
use crate::validation::{
    attachment_rejection, DepositForm, IbForm, KycUploadForm, TransferForm, ValidationErrors,
};

/// Transactions shown on the dashboard landing view.
pub const RECENT_TRANSACTIONS: usize = 5;

pub struct PortfolioService {
    api: Arc<dyn DeskApi>,
    session: Arc<SessionContext>,
}

impl PortfolioService {
    pub fn new(api: Arc<dyn DeskApi>, session: Arc<SessionContext>) -> Self {
        Self { api, session }
    }

    fn user_id(&self) -> DeskResult<String> {
        Ok(self.session.require()?.user_id)
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    pub async fn accounts(&self) -> DeskResult<Vec<Account>> {
        let user_id = self.user_id()?;
        let mut accounts = self.api.list_accounts().await?;
        accounts.retain(|a| a.user_id == user_id);
        Ok(accounts)
    }

    pub async fn create_account(&self, request: NewAccount) -> DeskResult<Account> {
        let user_id = self.user_id()?;

        let mut errors = ValidationErrors::default();
        if request.account_type.trim().is_empty() {
            errors.push("accountType", "Account type is required");
        }
        if request.currency.trim().is_empty() {
            errors.push("currency", "Currency is required");
        }
        if request.leverage.trim().is_empty() {
            errors.push("leverage", "Leverage is required");
        }
        if matches!(request.initial_deposit, Some(d) if !d.is_finite() || d < 0.0) {
            errors.push("initialDeposit", "Initial deposit cannot be negative");
        }
        if !errors.is_empty() {
            return Err(errors.into());
        }

        let account = self.api.create_account(&request.into_account(&user_id)).await?;
        tracing::info!(account = %account.account_number, "Trading account opened");
        Ok(account)
    }

    async fn owned_account(&self, user_id: &str, account_id: &str) -> DeskResult<Account> {
        self.api
            .list_accounts()
            .await?
            .into_iter()
            .find(|a| a.user_id == user_id && a.id == account_id)
            .ok_or_else(|| DeskError::NotFound {
                resource: "account",
                id: account_id.to_string(),
            })
    }

    // ========================================================================
    // Funding
    // ========================================================================

    pub async fn transactions(&self, query: &TransactionQuery) -> DeskResult<Vec<Transaction>> {
        let user_id = self.user_id()?;
        self.owned_transactions(&user_id, query).await
    }

    /// Scoped to `user_id`. The limit is applied here after the owner filter,
    /// never by the backend.
    async fn owned_transactions(
        &self,
        user_id: &str,
        query: &TransactionQuery,
    ) -> DeskResult<Vec<Transaction>> {
        let scoped = TransactionQuery {
            limit: None,
            ..query.clone().for_user(user_id)
        };
        let mut txs = self.api.list_transactions(&scoped).await?;
        txs.retain(|t| t.user_id == user_id);
        if let Some(limit) = query.limit {
            txs.truncate(limit);
        }
        Ok(txs)
    }

    /// Record a deposit request. Funds settle out of band, so it starts as `Processing`.
    pub async fn deposit(&self, form: &DepositForm) -> DeskResult<Transaction> {
        let user_id = self.user_id()?;
        form.validate()?;
        let account = self.owned_account(&user_id, form.account_id.trim()).await?;

        let tx = Transaction {
            id: new_id(),
            user_id,
            kind: TransactionKind::Deposit,
            amount: form.amount,
            currency: form.currency.trim().to_string(),
            method: Some(form.method.to_string()),
            account_id: Some(account.id),
            status: "Processing".to_string(),
            date: Utc::now(),
            from_account: None,
            to_account: None,
        };
        let created = self.api.create_transaction(&tx).await?;
        tracing::info!(tx_id = %created.id, method = %form.method, amount = form.amount, "Deposit requested");
        Ok(created)
    }

    pub async fn transfer(&self, form: &TransferForm) -> DeskResult<Transaction> {
        let user_id = self.user_id()?;
        form.validate()?;
        let from = self.owned_account(&user_id, form.from_account.trim()).await?;
        let to = self.owned_account(&user_id, form.to_account.trim()).await?;

        let tx = Transaction {
            id: new_id(),
            user_id,
            kind: TransactionKind::Transfer,
            amount: form.amount,
            currency: form.currency.trim().to_string(),
            method: None,
            account_id: None,
            status: "Completed".to_string(),
            date: Utc::now(),
            from_account: Some(from.id),
            to_account: Some(to.id),
        };
        let created = self.api.create_transaction(&tx).await?;
        tracing::info!(tx_id = %created.id, amount = form.amount, "Internal transfer recorded");
        Ok(created)
    }

    // ========================================================================
    // KYC
    // ========================================================================

    pub async fn kyc_documents(&self) -> DeskResult<Vec<KycDocument>> {
        let user_id = self.user_id()?;
        let mut docs = self.api.list_kyc_documents().await?;
        docs.retain(|d| d.user_id == user_id);
        Ok(docs)
    }

    pub async fn upload_kyc_document(&self, form: &KycUploadForm) -> DeskResult<KycDocument> {
        self.upload_kyc_document_on(form, Utc::now().date_naive()).await
    }

    async fn upload_kyc_document_on(
        &self,
        form: &KycUploadForm,
        today: NaiveDate,
    ) -> DeskResult<KycDocument> {
        let user_id = self.user_id()?;
        let mut errors = match form.validate(today) {
            Ok(()) => ValidationErrors::default(),
            Err(e) => e,
        };
        if let Some(reason) = form.file.as_ref().and_then(attachment_rejection) {
            errors.push("file", reason.to_string());
        }
        if !errors.is_empty() {
            return Err(errors.into());
        }

        let doc = KycDocument {
            id: new_id(),
            user_id,
            document_type: form.document_type,
            document_number: Some(form.document_number.trim().to_string()),
            expiry_date: form.expiry_date,
            upload_date: Utc::now(),
            status: KycStatus::Pending,
        };
        let created = self.api.create_kyc_document(&doc).await?;
        tracing::info!(doc_id = %created.id, kind = %created.document_type, "KYC document submitted");
        Ok(created)
    }

    // ========================================================================
    // Introducing-broker applications
    // ========================================================================

    pub async fn ib_requests(&self) -> DeskResult<Vec<IbRequest>> {
        let user_id = self.user_id()?;
        let mut requests = self.api.list_ib_requests().await?;
        requests.retain(|r| r.user_id == user_id);
        requests.sort_by(|a, b| b.submission_date.cmp(&a.submission_date));
        Ok(requests)
    }

    /// New applications always start under review, stamped with the current time.
    pub async fn submit_ib_request(&self, form: &IbForm) -> DeskResult<IbRequest> {
        let user_id = self.user_id()?;
        form.validate()?;

        let optional = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };
        let request = IbRequest {
            id: new_id(),
            user_id,
            company_name: form.company_name.trim().to_string(),
            contact_person: form.contact_person.trim().to_string(),
            status: IB_UNDER_REVIEW.to_string(),
            submission_date: Utc::now(),
            email: optional(&form.email),
            phone: optional(&form.phone),
            address: optional(&form.address),
            experience: optional(&form.experience),
        };
        let created = self.api.create_ib_request(&request).await?;
        tracing::info!(request_id = %created.id, company = %created.company_name, "IB application submitted");
        Ok(created)
    }

    // ========================================================================
    // Dashboard
    // ========================================================================

    /// Stats, recent activity and open positions, fetched concurrently.
    pub async fn dashboard(&self) -> DeskResult<DashboardOverview> {
        let user_id = self.user_id()?;
        let recent = TransactionQuery::recent(RECENT_TRANSACTIONS);
        let (stats, recent_transactions, positions) = futures::try_join!(
            self.api.dashboard_stats(),
            self.owned_transactions(&user_id, &recent),
            self.api.list_positions(),
        )?;
        Ok(DashboardOverview {
            stats,
            recent_transactions,
            positions,
        })
    }
}
