//! 棋盘拓扑：24 个点位、相邻关系与 16 条成三线。
//!
//! ```text
//!  0----------1----------2
//!  |          |          |
//!  |  3-------4-------5  |
//!  |  |       |       |  |
//!  |  |  6----7----8  |  |
//!  |  |  |         |  |  |
//!  9--10-11       12-13-14
//!  |  |  |         |  |  |
//!  |  |  15---16---17 |  |
//!  |  |       |       |  |
//!  |  18------19------20 |
//!  |          |          |
//!  21---------22---------23
//! ```

use once_cell::sync::Lazy;

/// 棋盘上的点位编号（0..24）。
pub type Position = u8;

pub const TOTAL_POSITIONS: usize = 24;
pub const PIECES_PER_PLAYER: u8 = 9;

/// 每个点位的相邻点位，按编号升序。
pub const ADJACENCY: [&[Position]; TOTAL_POSITIONS] = [
    &[1, 9],
    &[0, 2, 4],
    &[1, 14],
    &[4, 10],
    &[1, 3, 5, 7],
    &[4, 13],
    &[7, 11],
    &[4, 6, 8],
    &[7, 12],
    &[0, 10, 21],
    &[3, 9, 11, 18],
    &[6, 10, 15],
    &[8, 13, 17],
    &[5, 12, 14, 20],
    &[2, 13, 23],
    &[11, 16],
    &[15, 17, 19],
    &[12, 16],
    &[10, 19],
    &[16, 18, 20, 22],
    &[13, 19],
    &[9, 22],
    &[19, 21, 23],
    &[14, 22],
];

/// 全部 16 条成三线。
pub const MILLS: [[Position; 3]; 16] = [
    // outer square
    [0, 1, 2],
    [2, 14, 23],
    [21, 22, 23],
    [0, 9, 21],
    // middle square
    [3, 4, 5],
    [5, 13, 20],
    [18, 19, 20],
    [3, 10, 18],
    // inner square
    [6, 7, 8],
    [8, 12, 17],
    [15, 16, 17],
    [6, 11, 15],
    // spokes
    [1, 4, 7],
    [16, 19, 22],
    [9, 10, 11],
    [12, 13, 14],
];

static MILLS_BY_POSITION: Lazy<[Vec<usize>; TOTAL_POSITIONS]> = Lazy::new(|| {
    let mut table: [Vec<usize>; TOTAL_POSITIONS] = Default::default();
    for (index, mill) in MILLS.iter().enumerate() {
        for &pos in mill {
            table[pos as usize].push(index);
        }
    }
    table
});

/// 度数为 4 的十字交叉点。
pub static CROSS_POSITIONS: Lazy<Vec<Position>> = Lazy::new(|| {
    (0..TOTAL_POSITIONS as Position)
        .filter(|&pos| ADJACENCY[pos as usize].len() == 4)
        .collect()
});

pub fn is_valid_position(n: i64) -> bool {
    (0..TOTAL_POSITIONS as i64).contains(&n)
}

/// 相邻点位；越界时返回空切片。
pub fn adjacency(pos: Position) -> &'static [Position] {
    ADJACENCY.get(pos as usize).copied().unwrap_or(&[])
}

pub fn mills() -> &'static [[Position; 3]; 16] {
    &MILLS
}

/// 包含 `pos` 的成三线（每个点位恰好两条）。
pub fn mills_containing(pos: Position) -> impl Iterator<Item = &'static [Position; 3]> {
    MILLS_BY_POSITION
        .get(pos as usize)
        .into_iter()
        .flatten()
        .map(|&index| &MILLS[index])
}

pub fn all_positions() -> impl Iterator<Item = Position> {
    0..TOTAL_POSITIONS as Position
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacency_is_symmetric_with_degree_two_to_four() {
        for pos in all_positions() {
            let neighbours = adjacency(pos);
            assert!((2..=4).contains(&neighbours.len()), "degree of {pos}");
            for &other in neighbours {
                assert!(
                    adjacency(other).contains(&pos),
                    "{pos} -> {other} has no reverse edge"
                );
            }
        }
    }

    #[test]
    fn every_position_sits_on_exactly_two_mills() {
        for pos in all_positions() {
            assert_eq!(mills_containing(pos).count(), 2, "position {pos}");
        }
    }

    #[test]
    fn mill_lines_follow_board_edges() {
        // 每条成三线的中点与两端相邻。
        for mill in mills() {
            assert!(adjacency(mill[1]).contains(&mill[0]));
            assert!(adjacency(mill[1]).contains(&mill[2]));
        }
    }

    #[test]
    fn cross_positions_are_the_four_way_points() {
        assert_eq!(CROSS_POSITIONS.as_slice(), &[4, 10, 13, 19]);
    }

    #[test]
    fn position_validity_bounds() {
        assert!(is_valid_position(0));
        assert!(is_valid_position(23));
        assert!(!is_valid_position(24));
        assert!(!is_valid_position(-1));
        assert!(adjacency(24).is_empty());
        assert_eq!(mills_containing(99).count(), 0);
    }
}
