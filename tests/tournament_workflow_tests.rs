use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use futures::future::join_all;
use tower::ServiceExt; // for `oneshot`

use clubrank::{
    rating::types::RankingResponse, router, tournament::models::TournamentStatus, AppError,
    Outcome,
};

mod utils;

use utils::{
    actions::by_board,
    assertions::assert_no_rematches,
    RatingAssertion, TestSetupBuilder,
};

#[tokio::test]
async fn test_five_player_swiss_runs_to_final_ranking() {
    let setup = TestSetupBuilder::new().with_five_players().build().await;
    let tournament = setup.started_tournament(Some(3)).await;
    let tournament_id = tournament.id.as_str();

    let round_one = setup.play_round(tournament_id, by_board).await;
    let bye = round_one.iter().find(|p| p.is_bye()).unwrap();
    assert_eq!(bye.player_a, "erin");

    setup.play_round(tournament_id, by_board).await;
    setup.play_round(tournament_id, by_board).await;

    let pairings = setup
        .state
        .tournaments
        .get_pairings(tournament_id)
        .await
        .unwrap();
    assert_eq!(pairings.len(), 9);
    let byes: Vec<&str> = pairings
        .iter()
        .filter(|p| p.player_b.is_none())
        .map(|p| p.player_a.as_str())
        .collect();
    assert_eq!(byes.len(), 3);
    let distinct: std::collections::HashSet<&str> = byes.iter().copied().collect();
    assert_eq!(distinct.len(), 3, "a player received two byes: {:?}", byes);

    let extra_round = setup
        .state
        .tournaments
        .generate_next_round(tournament_id, false)
        .await;
    assert!(matches!(extra_round, Err(AppError::Conflict(_))));

    let ranking = setup
        .state
        .tournaments
        .finalize_tournament(tournament_id)
        .await
        .unwrap();
    let ranks: Vec<u32> = ranking.iter().map(|e| e.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    let total_points: f64 = ranking.iter().map(|e| e.score).sum();
    assert_eq!(total_points, 9.0);
    for pair in ranking.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    let again = setup
        .state
        .tournaments
        .finalize_tournament(tournament_id)
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_string(&again).unwrap(),
        serde_json::to_string(&ranking).unwrap()
    );

    let (completed, _) = setup
        .state
        .tournaments
        .get_final_ranking(tournament_id)
        .await
        .unwrap();
    assert_eq!(completed.status, TournamentStatus::Completed);

    RatingAssertion::for_club(&setup)
        .is_zero_sum()
        .await
        .histories_are_chained()
        .await;
}

#[tokio::test]
async fn test_rounds_never_repeat_a_pairing() {
    let setup = TestSetupBuilder::new()
        .with_players(vec!["p1", "p2", "p3", "p4", "p5", "p6", "p7", "p8"])
        .build()
        .await;
    let tournament = setup.started_tournament(Some(4)).await;

    let mut all_pairings = Vec::new();
    for _ in 0..4 {
        all_pairings.extend(setup.play_round(&tournament.id, by_board).await);
    }

    assert_eq!(all_pairings.len(), 16);
    assert_no_rematches(&all_pairings);
}

#[tokio::test]
async fn test_concurrent_results_keep_ratings_consistent() {
    let setup = TestSetupBuilder::new()
        .with_players(vec!["p1", "p2", "p3", "p4", "p5", "p6", "p7", "p8"])
        .build()
        .await;
    let tournament = setup.started_tournament(None).await;

    let pairings = setup
        .state
        .tournaments
        .generate_next_round(&tournament.id, false)
        .await
        .unwrap();

    // Every board reported twice at once: one submission wins per match
    let mut handles = Vec::new();
    for pairing in &pairings {
        let match_id = pairing.match_id.clone().unwrap();
        for outcome in [Outcome::AWin, Outcome::BWin] {
            let matches = setup.state.matches.clone();
            let match_id = match_id.clone();
            handles.push(tokio::spawn(async move {
                matches.submit_result(&match_id, outcome).await
            }));
        }
    }
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|handle| handle.unwrap())
        .collect();

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::Conflict(_))))
        .count();
    assert_eq!(accepted, pairings.len());
    assert_eq!(duplicates, pairings.len());

    for result in results.iter().flatten() {
        assert_eq!(result.delta_a + result.delta_b, 0);
    }

    RatingAssertion::for_club(&setup)
        .is_zero_sum()
        .await
        .histories_are_chained()
        .await;
}

#[tokio::test]
async fn test_casual_games_move_club_ranking_over_http() {
    let setup = TestSetupBuilder::new().build().await;
    let app = router(setup.state.clone());

    for player in ["alice", "bob"] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/clubs/club-1/members")
                    .header("content-type", "application/json")
                    .body(Body::from(format!(r#"{{"player_id": "{}"}}"#, player)))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/clubs/club-1/games")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"player_a": "alice", "player_b": "bob", "outcome": "B_WIN"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/clubs/club-1/ranking")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let ranking: RankingResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(ranking.players[0].player_id, "bob");
    assert_eq!(ranking.players[0].rating, 1516);
    assert_eq!(ranking.players[1].rating, 1484);
    assert_eq!(ranking.players[1].games_played, 1);
}
