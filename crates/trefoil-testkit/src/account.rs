use async_trait::async_trait;
use parking_lot::Mutex;
use trefoil_core::effects::AccountProvider;
use trefoil_core::FullAccount;

/// Account provider whose active account tests set directly.
#[derive(Debug, Default)]
pub struct FakeAccountProvider {
    account: Mutex<Option<FullAccount>>,
}

impl FakeAccountProvider {
    pub fn new(account: Option<FullAccount>) -> Self {
        Self {
            account: Mutex::new(account),
        }
    }

    pub fn set_account(&self, account: Option<FullAccount>) {
        *self.account.lock() = account;
    }
}

#[async_trait]
impl AccountProvider for FakeAccountProvider {
    async fn active_full_account(&self) -> Option<FullAccount> {
        self.account.lock().clone()
    }
}
