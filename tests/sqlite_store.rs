// Persistence across reopening an on-disk database

use bank_of_bit::{
    import_clients, read_clients_csv, BankAccount, BankService, Client, SqliteStore, StatusKind,
};
use tempfile::TempDir;

const CSV: &str = "\
FirstName,LastName,Address,City,Province,PostalCode,Notes
Grace,Hopper,1 Compiler Rd,Winnipeg,MB,R3C 4T3,
Alan,Turing,7 Enigma St,Brandon,MB,R7A 1B2,prefers mail
";

#[test]
fn test_data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bank.db");

    let (client_id, account_id) = {
        let service = BankService::new(SqliteStore::open(&path).unwrap()).unwrap();
        let client = service
            .register_client(Client::new(
                "Ada",
                "Lovelace",
                "12 Analytical Way",
                "Kitchener",
                "ON",
                "N2G 4M4",
            ))
            .unwrap();
        let client_id = client.client_id.unwrap();

        let account = service
            .open_account(BankAccount::investment(client_id, 1, 5000.0, 0.04))
            .unwrap();
        (client_id, account.bank_account_id.unwrap())
    };

    let service = BankService::new(SqliteStore::open(&path).unwrap()).unwrap();

    let client = service.client(client_id).unwrap();
    assert_eq!(client.client_number, 10_000_000);
    assert_eq!(client.full_name(), "Ada Lovelace");

    let details = service.account_details(account_id).unwrap();
    assert_eq!(details.account.account_number, 1);
    assert_eq!(details.status.kind, StatusKind::Active);
    assert_eq!(details.effective_rate, Some(0.04));

    // Statuses are seeded once, not per open
    assert_eq!(service.statuses().unwrap().len(), 5);

    // Numbering continues from what is stored
    let next = service
        .register_client(Client::new(
            "Charles",
            "Babbage",
            "3 Engine Lane",
            "Waterloo",
            "ON",
            "N2L 3G1",
        ))
        .unwrap();
    assert_eq!(next.client_number, 10_000_001);

    let history = service.history("client", client_id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].event_type, "client_registered");
}

#[test]
fn test_import_is_idempotent_across_sessions() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bank.db");

    {
        let service = BankService::new(SqliteStore::open(&path).unwrap()).unwrap();
        let records = read_clients_csv(CSV.as_bytes()).unwrap();
        let summary = import_clients(&service, records).unwrap();
        assert_eq!(summary.inserted, 2);
    }

    let store = SqliteStore::open(&path).unwrap();
    let service = BankService::new(store).unwrap();
    let records = read_clients_csv(CSV.as_bytes()).unwrap();
    let summary = import_clients(&service, records).unwrap();

    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.duplicates, 2);
    assert_eq!(service.store().count_clients().unwrap(), 2);

    let turing = service
        .clients()
        .unwrap()
        .into_iter()
        .find(|c| c.last_name == "Turing")
        .unwrap();
    assert_eq!(turing.notes.as_deref(), Some("prefers mail"));
}
