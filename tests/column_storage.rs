//! End-to-end scenarios over the column storage engine: block allocation at
//! capacity boundaries, multi-block LOB chains, integrity verification on
//! reopen, rollback, and the master column lifecycle.

use std::path::Path;
use std::sync::Arc;

use strata::config::{BLOCK_HEADER_SIZE, FIRST_USER_TRID, LOB_CHUNK_HEADER_SIZE};
use strata::storage::{
    Column, ColumnContext, ColumnDataAddress, ColumnDataBlock, ColumnDataRecord, DmlOperationType,
    LobChunkHeader, MasterColumnRecord,
};
use strata::types::{ColumnDataType, Variant};
use strata::StorageError;
use tempfile::tempdir;

fn small_ctx(dir: &Path) -> ColumnContext {
    let mut ctx = ColumnContext::new("shop", "orders", 1, 1, dir);
    ctx.block_data_area_size = 256;
    ctx
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn values_pack_blocks_exactly_before_spilling() {
    let dir = tempdir().unwrap();
    let ctx = small_ctx(dir.path());
    let column = Column::create(&ctx, "amount", 1, ColumnDataType::UInt64, false).unwrap();

    // 32 eight-byte values fill the 256-byte data area with no slack
    let mut addresses = Vec::new();
    for i in 0..33u64 {
        let (start, end) = column.put_record(&mut Variant::from(i)).unwrap();
        assert_eq!(end.offset() - start.offset(), 8);
        addresses.push(start);
    }
    assert_eq!(addresses[31], ColumnDataAddress::new(1, 248));
    assert_eq!(addresses[32], ColumnDataAddress::new(2, 0));

    for (i, &addr) in addresses.iter().enumerate() {
        assert_eq!(
            column.read_record(addr, false).unwrap(),
            Variant::UInt64(i as u64)
        );
    }
}

#[test]
fn lob_chain_spans_blocks_and_links_check_out() {
    let dir = tempdir().unwrap();
    let ctx = small_ctx(dir.path());
    let data = payload(900);
    let start;
    {
        let column = Column::create(&ctx, "body", 2, ColumnDataType::Binary, false).unwrap();
        start = column.put_record(&mut Variant::from(data.clone())).unwrap().0;
    }

    // follow the chunk chain through the raw block files
    let read_chunk = |addr: ColumnDataAddress| -> (LobChunkHeader, Vec<u8>) {
        let file = dir
            .path()
            .join("body")
            .join(format!("b{}.sdb", addr.block_id()));
        let bytes = std::fs::read(file).unwrap();
        let base = BLOCK_HEADER_SIZE + addr.offset() as usize;
        let header = LobChunkHeader::decode(&bytes[base..base + LOB_CHUNK_HEADER_SIZE]).unwrap();
        let payload_base = base + LOB_CHUNK_HEADER_SIZE;
        let chunk = bytes[payload_base..payload_base + header.chunk_length as usize].to_vec();
        (header, chunk)
    };

    let mut assembled = Vec::new();
    let mut blocks_seen = Vec::new();
    let mut addr = start;
    loop {
        let (header, chunk) = read_chunk(addr);
        assert_eq!(
            header.remaining_lob_length as usize,
            data.len() - assembled.len()
        );
        blocks_seen.push(addr.block_id());
        assembled.extend_from_slice(&chunk);
        if !header.has_next() {
            break;
        }
        addr = ColumnDataAddress::new(header.next_chunk_block_id, header.next_chunk_offset);
    }
    assert_eq!(assembled, data);
    assert!(blocks_seen.len() >= 3);
    blocks_seen.dedup();
    assert!(blocks_seen.len() >= 3, "chain should span several blocks");

    // and the engine reads the same bytes back after a reopen
    let column = Column::open(&ctx, "body", 2, ColumnDataType::Binary, false).unwrap();
    let mut value = column.read_record(start, true).unwrap();
    assert_eq!(
        value.get_blob().unwrap().read_as_binary(usize::MAX).unwrap(),
        data
    );
}

#[test]
fn text_column_round_trips_inline_and_streamed() {
    let dir = tempdir().unwrap();
    let ctx = small_ctx(dir.path());
    let long_text: String = std::iter::repeat("lorem ipsum ").take(60).collect();
    let short_addr;
    let long_addr;
    {
        let column = Column::create(&ctx, "note", 3, ColumnDataType::Text, false).unwrap();
        short_addr = column.put_record(&mut Variant::from("hello")).unwrap().0;
        long_addr = column
            .put_record(&mut Variant::from(long_text.clone()))
            .unwrap()
            .0;
    }

    let column = Column::open(&ctx, "note", 3, ColumnDataType::Text, false).unwrap();
    assert_eq!(
        column.read_record(short_addr, false).unwrap(),
        Variant::String("hello".into())
    );
    let mut value = column.read_record(long_addr, true).unwrap();
    let clob = value.get_clob().unwrap();
    assert_eq!(clob.size(), long_text.len() as u64);
    assert_eq!(clob.read_as_string(usize::MAX).unwrap(), long_text);
}

#[test]
fn corrupting_a_closed_block_fails_reopen() {
    let dir = tempdir().unwrap();
    let ctx = small_ctx(dir.path());
    {
        let column = Column::create(&ctx, "amount", 1, ColumnDataType::UInt64, false).unwrap();
        for i in 0..70u64 {
            column.put_record(&mut Variant::from(i)).unwrap();
        }
    }

    // block 2 is closed and sits in the middle of the chain
    let path = dir.path().join("amount").join("b2.sdb");
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[BLOCK_HEADER_SIZE + 100] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    let err = Column::open(&ctx, "amount", 1, ColumnDataType::UInt64, false).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StorageError>(),
        Some(StorageError::BlockDigestMismatch { block_id: 2, .. })
    ));
}

#[test]
fn deleting_a_chained_block_breaks_the_walk() {
    let dir = tempdir().unwrap();
    let ctx = small_ctx(dir.path());
    {
        let column = Column::create(&ctx, "amount", 1, ColumnDataType::UInt64, false).unwrap();
        for i in 0..70u64 {
            column.put_record(&mut Variant::from(i)).unwrap();
        }
    }

    std::fs::remove_file(dir.path().join("amount").join("b2.sdb")).unwrap();
    assert!(Column::open(&ctx, "amount", 1, ColumnDataType::UInt64, false).is_err());
}

#[test]
fn rollback_across_blocks_reuses_reopened_space() {
    let dir = tempdir().unwrap();
    let ctx = small_ctx(dir.path());
    let column = Column::create(&ctx, "amount", 1, ColumnDataType::UInt64, false).unwrap();

    let mut addresses = Vec::new();
    for i in 0..70u64 {
        addresses.push(column.put_record(&mut Variant::from(i)).unwrap().0);
    }
    // head is in block 3; roll back into the middle of block 1
    let target = addresses[10];
    assert_eq!(target, ColumnDataAddress::new(1, 80));
    column.rollback_to_address(target, 3).unwrap();

    // rolled-back space is reused from the target onward
    let (next, _) = column.put_record(&mut Variant::from(500u64)).unwrap();
    assert_eq!(next, target);
    for (i, &addr) in addresses[..10].iter().enumerate() {
        assert_eq!(
            column.read_record(addr, false).unwrap(),
            Variant::UInt64(i as u64)
        );
    }

    // the rolled-back chain still passes the consistency walk after reopen
    drop(column);
    let column = Column::open(&ctx, "amount", 1, ColumnDataType::UInt64, false).unwrap();
    assert_eq!(
        column.read_record(next, false).unwrap(),
        Variant::UInt64(500)
    );
}

#[test]
fn chain_extension_picks_the_roomiest_block() {
    let dir = tempdir().unwrap();
    let ctx = small_ctx(dir.path());
    let column = Column::create(&ctx, "body", 2, ColumnDataType::Binary, false).unwrap();

    // a 680-byte chain spans blocks 1..3; rolling back to its start reopens
    // every block with a zeroed cursor
    let (start, _) = column.put_record(&mut Variant::from(payload(680))).unwrap();
    column.rollback_to_address(start, 3).unwrap();

    // refill so blocks 1..3 end up with 20 / 30 / 40 free bytes; none can
    // hold the header of a fresh chunk
    column.put_record(&mut Variant::from(payload(216))).unwrap();
    column.put_record(&mut Variant::from(payload(206))).unwrap();
    column.put_record(&mut Variant::from(payload(196))).unwrap();

    let (next, _) = column.put_record(&mut Variant::from(payload(100))).unwrap();
    assert_eq!(next, ColumnDataAddress::new(4, 0));
    drop(column);

    // the new block chains off block 3, the roomiest candidate, not off the
    // stale write head in block 1
    let block = ColumnDataBlock::open(&dir.path().join("body"), 4).unwrap();
    assert_eq!(block.prev_block_id(), 3);
    drop(block);

    let column = Column::open(&ctx, "body", 2, ColumnDataType::Binary, false).unwrap();
    assert_eq!(
        column.read_record(next, false).unwrap(),
        Variant::Binary(payload(100))
    );
}

#[test]
fn failed_rollback_leaves_the_column_untouched() {
    let dir = tempdir().unwrap();
    let ctx = small_ctx(dir.path());
    let column = Column::create(&ctx, "amount", 1, ColumnDataType::UInt64, false).unwrap();

    let mut addresses = Vec::new();
    for i in 0..40u64 {
        addresses.push(column.put_record(&mut Variant::from(i)).unwrap().0);
    }

    // head sits at block 2, offset 64; the target is not on the chain
    let err = column
        .rollback_to_address(ColumnDataAddress::new(99, 0), 2)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StorageError>(),
        Some(StorageError::UnreachableRollbackTarget { .. })
    ));

    // no cursor moved: the next write continues at the head and every
    // committed record is still readable
    let (next, _) = column.put_record(&mut Variant::from(40u64)).unwrap();
    assert_eq!(next, ColumnDataAddress::new(2, 64));
    for (i, &addr) in addresses.iter().enumerate() {
        assert_eq!(
            column.read_record(addr, false).unwrap(),
            Variant::UInt64(i as u64)
        );
    }
}

#[test]
fn null_policy_is_enforced_per_column() {
    let dir = tempdir().unwrap();
    let ctx = small_ctx(dir.path());
    let nullable = Column::create(&ctx, "opt", 1, ColumnDataType::Int32, false).unwrap();
    let (start, end) = nullable.put_record(&mut Variant::Null).unwrap();
    assert!(start.is_null());
    assert!(end.is_null());
    assert_eq!(nullable.read_record(start, false).unwrap(), Variant::Null);

    let mut strict = small_ctx(dir.path());
    strict.not_null = true;
    let required = Column::create(&strict, "req", 2, ColumnDataType::Int32, false).unwrap();
    let err = required.put_record(&mut Variant::Null).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StorageError>(),
        Some(StorageError::NullValueNotAllowed { .. })
    ));
}

#[test]
fn master_column_survives_reopen() {
    let dir = tempdir().unwrap();
    let ctx = small_ctx(dir.path());

    let trid;
    let value_addr;
    {
        let values = Column::create(&ctx, "amount", 1, ColumnDataType::Int64, false).unwrap();
        let master = Column::create(&ctx, "rows", 0, ColumnDataType::Binary, true).unwrap();

        trid = master.generate_next_user_trid().unwrap();
        assert_eq!(trid, FIRST_USER_TRID);
        value_addr = values.put_record(&mut Variant::from(42i64)).unwrap().0;

        let insert = MasterColumnRecord::new(
            DmlOperationType::Insert,
            trid,
            1000,
            1000,
            vec![ColumnDataRecord::new(value_addr, 1000, 1000)],
        );
        master.put_master_column_record(&insert).unwrap();

        let update = MasterColumnRecord::new(
            DmlOperationType::Update,
            trid,
            1000,
            2000,
            vec![ColumnDataRecord::new(value_addr, 1000, 2000)],
        );
        master.put_master_column_record(&update).unwrap();
    }

    let master = Column::open(&ctx, "rows", 0, ColumnDataType::Binary, true).unwrap();
    let record = master.get_master_column_record(trid).unwrap();
    assert_eq!(record.operation, DmlOperationType::Update);
    assert_eq!(record.update_timestamp, 2000);
    assert_eq!(record.column_records[0].address, value_addr);

    // trid space continues where it left off
    assert_eq!(master.generate_next_user_trid().unwrap(), trid + 1);

    master.erase_from_master_index(trid).unwrap();
    let err = master.find_master_record_address(trid).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StorageError>(),
        Some(StorageError::TridNotFound { .. })
    ));
}

#[test]
fn reads_through_streams_keep_column_usable() {
    let dir = tempdir().unwrap();
    let ctx = small_ctx(dir.path());
    let column: Arc<Column> =
        Column::create(&ctx, "body", 2, ColumnDataType::Binary, false).unwrap();

    let data = payload(700);
    let (start, _) = column.put_record(&mut Variant::from(data.clone())).unwrap();

    // hold an open stream while writing more values through the same column
    let mut value = column.read_record(start, true).unwrap();
    let (second, _) = column.put_record(&mut Variant::from(payload(50))).unwrap();
    assert_eq!(
        value.get_blob().unwrap().read_as_binary(usize::MAX).unwrap(),
        data
    );
    let mut small = column.read_record(second, false).unwrap();
    assert_eq!(
        small.get_blob().is_err(),
        true,
        "small binary values materialize inline"
    );
    assert_eq!(small, Variant::Binary(payload(50)));
}
