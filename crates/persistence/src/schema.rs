//! Keyspace and table DDL for calls, call log events, turns, agents,
//! campaigns, and cached prompt handles (spec §3).

use scylla::Session;

use crate::error::Result;

pub async fn create_keyspace(session: &Session, keyspace: &str, replication_factor: u8) -> Result<()> {
    let statement = format!(
        "CREATE KEYSPACE IF NOT EXISTS {keyspace} WITH replication = \
         {{'class': 'SimpleStrategy', 'replication_factor': {replication_factor}}}"
    );
    session.query_unpaged(statement, &[]).await?;
    Ok(())
}

pub async fn create_tables(session: &Session, keyspace: &str) -> Result<()> {
    session
        .query_unpaged(
            format!(
                "CREATE TABLE IF NOT EXISTS {keyspace}.calls (
                    id text PRIMARY KEY,
                    agent_id text,
                    lead_id text,
                    direction text,
                    start_at timestamp,
                    answered_at timestamp,
                    ended_at timestamp,
                    status text,
                    duration_secs int,
                    carrier_type text,
                    recording_url text,
                    outcome text,
                    final_sentiment float,
                    campaign_id text
                )"
            ),
            &[],
        )
        .await?;

    session
        .query_unpaged(
            format!(
                "CREATE TABLE IF NOT EXISTS {keyspace}.call_logs (
                    call_id text,
                    timestamp timestamp,
                    event text,
                    campaign_id text,
                    details text,
                    provider_payload text,
                    PRIMARY KEY (call_id, timestamp)
                ) WITH CLUSTERING ORDER BY (timestamp ASC)"
            ),
            &[],
        )
        .await?;

    session
        .query_unpaged(
            format!(
                "CREATE TABLE IF NOT EXISTS {keyspace}.turns (
                    call_id text,
                    index int,
                    user_transcript text,
                    agent_response text,
                    started_at timestamp,
                    completed_at timestamp,
                    stage text,
                    profile text,
                    objections text,
                    principle text,
                    filler_id text,
                    sentiment float,
                    interrupted boolean,
                    PRIMARY KEY (call_id, index)
                ) WITH CLUSTERING ORDER BY (index ASC)"
            ),
            &[],
        )
        .await?;

    session
        .query_unpaged(
            format!(
                "CREATE TABLE IF NOT EXISTS {keyspace}.agents (
                    id text PRIMARY KEY,
                    config text
                )"
            ),
            &[],
        )
        .await?;

    session
        .query_unpaged(
            format!(
                "CREATE TABLE IF NOT EXISTS {keyspace}.campaigns (
                    id text PRIMARY KEY,
                    name text,
                    agent_id text,
                    created_at timestamp
                )"
            ),
            &[],
        )
        .await?;

    session
        .query_unpaged(
            format!(
                "CREATE TABLE IF NOT EXISTS {keyspace}.cached_prompts (
                    agent_id text PRIMARY KEY,
                    handle text,
                    created_at timestamp,
                    expires_at timestamp,
                    char_count int,
                    document_count int
                )"
            ),
            &[],
        )
        .await?;

    Ok(())
}
