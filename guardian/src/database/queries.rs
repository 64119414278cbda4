//! Reference-data queries against the Guardian schema.

use super::{ConfigFlag, FieldLookup, Gateway, QueryOutcome, Value};
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;

const VERSION_SQL: &str = "SELECT NOV_VERSAO FROM novidade ORDER BY nov_codigo DESC LIMIT 1";

const ACTIVE_BRANCH_COUNT_SQL: &str = "SELECT COUNT(*) AS total FROM filial WHERE fil_ativo = 1";

const ACTIVE_BRANCHES_SQL: &str = "
    SELECT fil_codigo AS codigo_filial, fil_razao AS nome_filial
    FROM filial WHERE fil_ativo = 1 ORDER BY fil_codigo";

const OPERATION_TYPES_SQL: &str = "
    SELECT n.Nat_Codigo AS codigo_natureza, n.Nat_Desc AS descricao
    FROM natoper n JOIN classificanatop c ON n.NAT_CNTCODIGOS = c.CNT_CODIGO
    WHERE n.NAT_LIBERAVENDA = 1 AND c.CNT_TIPONATOP = 'V' AND n.Nat_Ativo = 1
    AND n.Nat_LanPreVenda = 1 AND c.CNT_Devolucao = 0 AND c.CNT_DEVOLNF = 0
    AND n.Nat_MDFCODIGO = 55 AND n.NAT_VENDAFUTURA = 0 AND n.NAT_CODIGO <> 'ORC'
    ORDER BY n.Nat_Desc";

const CUSTOMERS_SQL: &str = "
    SELECT p.PES_CODIGO AS codigo_cliente, p.pes_razao AS nome_cliente
    FROM cliente c JOIN pessoa p ON c.CLI_PESCODIGO = p.PES_CODIGO
    WHERE c.cli_limitecre > 0 AND p.PES_ATIVO = 1 AND c.cli_bloqfin = 0
    AND c.CLI_SITUAC1 = '' AND c.CLI_SITUAC2 = '' AND c.CLI_SITUAC3 = '' AND c.CLI_SITUAC4 = ''
    ORDER BY p.pes_razao";

const SALES_REPS_SQL: &str = "
    SELECT c.CLB_CODIGO AS codigo_colaborador, c.CLB_RAZAO AS nome_vendedor
    FROM vendedor v JOIN colaborador c ON v.ven_clbcodigo = c.CLB_CODIGO
    JOIN cargo cg ON c.CLB_CRGCODIGO = cg.CRG_CODIGO
    WHERE c.CLB_ATIVO = 1 ORDER BY c.CLB_RAZAO";

const CUSTOMER_PAYMENT_METHODS_SQL: &str = "
    SELECT DISTINCT fp.FPG_CODIGO AS codigo_forma, fp.FPG_DESC AS descricao
    FROM pessoa p
    JOIN (
        SELECT CLI_PESCODIGO, CLI_FPGCODIGO FROM cliente
        UNION
        SELECT FPE_PESCODIGO, FPE_FPGCODIGO FROM formapgpessoa
    ) AS formas_liberadas ON p.PES_CODIGO = formas_liberadas.CLI_PESCODIGO
    JOIN formapagto fp ON formas_liberadas.CLI_FPGCODIGO = fp.FPG_CODIGO
    WHERE p.PES_ATIVO = 1 AND fp.FPG_ATIVO = 1 AND p.PES_CODIGO = ?
    ORDER BY fp.FPG_DESC";

const ALL_PAYMENT_METHODS_SQL: &str = "
    SELECT FPG_CODIGO AS codigo_forma, FPG_DESC AS descricao FROM formapagto
    WHERE FPG_ATIVO = 1 AND fpg_habvenda = 1 AND fpg_receber = 1 ORDER BY FPG_DESC";

const CUSTOMER_PAYMENT_TERMS_SQL: &str = "
    SELECT DISTINCT cp.CPG_CODIGO AS codigo_condicao, cp.CPG_DESC AS descricao
    FROM (
        SELECT CLI_PESCODIGO, CLI_CPGCODIGO FROM cliente
        UNION
        SELECT CPE_PESCODIGO, CPE_CPGCODIGO FROM condpgpessoa
    ) AS condicoes_liberadas
    JOIN pessoa p ON condicoes_liberadas.CLI_PESCODIGO = p.PES_CODIGO
    JOIN condpagto cp ON condicoes_liberadas.CLI_CPGCODIGO = cp.CPG_CODIGO
    WHERE p.PES_ATIVO = 1 AND cp.CPG_ATIVO = 1 AND p.PES_CODIGO = ?
    AND NOT EXISTS (
        SELECT 1 FROM condnforma cnf
        WHERE cnf.cnf_cpgcodigo = condicoes_liberadas.CLI_CPGCODIGO
        AND cnf.cnf_fpgcodigo = ?
    )
    ORDER BY cp.CPG_DESC";

const ALL_PAYMENT_TERMS_SQL: &str = "
    SELECT cp.CPG_CODIGO AS codigo_condicao, cp.CPG_DESC AS descricao
    FROM condpagto cp
    WHERE cp.CPG_ATIVO = 1 AND NOT EXISTS (
        SELECT 1 FROM condnforma cnf
        WHERE cnf.cnf_cpgcodigo = cp.CPG_CODIGO AND cnf.cnf_fpgcodigo = ?
    )
    ORDER BY cp.CPG_DESC";

const SALES_ORDERS_SQL: &str = "
    SELECT ped_numero AS pedido, ped_spvcodigo AS serie
    FROM pedidos
    INNER JOIN natoper ON Ped_NatCodigo = Nat_Codigo
    INNER JOIN classificanatop ON NAT_CNTCODIGOS = CNT_CODIGO
    WHERE Ped_DtEmissao = ?
      AND NAT_LIBERAVENDA = 1
      AND CNT_TIPONATOP = 'V'
      AND Nat_Ativo = 1
      AND Nat_LanPreVenda = 1
      AND CNT_Devolucao = 0
      AND CNT_DEVOLNF = 0
      AND Nat_MDFCODIGO = 55
      AND NAT_VENDAFUTURA = 0
      AND NAT_CODIGO <> 'ORC'";

/// Available stock per product. Lot-controlled products sum their lots,
/// the rest sum their storage locations; both subtract pending deliveries.
pub(crate) fn available_products_sql(branch_scoped: bool) -> String {
    let branch_filter = if branch_scoped {
        " AND pf.pfi_filcodigo = ?"
    } else {
        ""
    };
    format!(
        "
    SELECT codigo_produto, nome_produto, EstoqueDisponivel
    FROM (
        SELECT
            pf.pfi_procodigo AS codigo_produto, p.pro_desc AS nome_produto,
            (COALESCE(SUM(lp.lpd_estfisico), 0) - pf.pfi_estpenentre) AS EstoqueDisponivel
        FROM produto p
        INNER JOIN produtofilial pf ON p.pro_codigo = pf.pfi_procodigo
        INNER JOIN unidadepro up ON p.pro_codigo = up.unp_procodigo AND up.unp_padestoque = 1
        LEFT JOIN localfilial lf ON pf.pfi_filcodigo = lf.lcf_filcodigo
        LEFT JOIN localprod lp ON lf.lcf_lcecodigo = lp.lpd_lcecodigo AND pf.pfi_procodigo = lp.lpd_procodigo
        WHERE p.pro_ativo = 1 AND (pf.pfi_inativo <> 1 OR pf.pfi_inativo IS NULL) AND p.pro_contlote = 0{branch_filter}
        GROUP BY pf.pfi_procodigo, p.pro_desc, pf.pfi_estpenentre
        UNION ALL
        SELECT
            pf.pfi_procodigo AS codigo_produto, p.pro_desc AS nome_produto,
            (COALESCE(SUM(pl.ple_estfisico), 0) - pf.pfi_estpenentre) AS EstoqueDisponivel
        FROM produto p
        INNER JOIN produtofilial pf ON p.pro_codigo = pf.pfi_procodigo
        INNER JOIN unidadepro up ON p.pro_codigo = up.unp_procodigo AND up.unp_padestoque = 1
        LEFT JOIN localfilial lf ON pf.pfi_filcodigo = lf.lcf_filcodigo
        LEFT JOIN produtolote pl ON lf.lcf_lcecodigo = pl.ple_lcecodigo AND pf.pfi_procodigo = pl.ple_procodigo
        WHERE p.pro_ativo = 1 AND (pf.pfi_inativo <> 1 OR pf.pfi_inativo IS NULL) AND p.pro_contlote = 1{branch_filter}
        GROUP BY pf.pfi_procodigo, p.pro_desc, pf.pfi_estpenentre
    ) AS EstoqueCalculado
    WHERE EstoqueDisponivel > 0
    ORDER BY codigo_produto"
    )
}

pub(crate) fn unit_counts_sql(count: usize) -> String {
    let placeholders = vec!["?"; count].join(",");
    format!(
        "
    SELECT
        p.pro_codigo AS codigo_produto,
        COUNT(up.unp_unidade) AS total_unidades_ativas
    FROM produto p
    JOIN unidadepro up ON p.pro_codigo = up.unp_procodigo
    WHERE up.unp_ativo = 1 AND p.pro_ativo = 1 AND p.pro_codigo IN ({placeholders})
    GROUP BY p.pro_codigo, p.pro_desc
    ORDER BY p.pro_codigo"
    )
}

/// Every lookup the workflow drivers make against the ERP database.
#[async_trait]
pub trait ReferenceData: Send + Sync {
    /// Latest application version recorded by the ERP updater.
    async fn app_version(&self) -> FieldLookup;
    async fn active_branch_count(&self) -> FieldLookup;
    /// Columns `codigo_filial`, `nome_filial`.
    async fn active_branches(&self) -> QueryOutcome;
    /// Columns `codigo_natureza`, `descricao`.
    async fn operation_types(&self) -> QueryOutcome;
    /// Columns `codigo_cliente`, `nome_cliente`.
    async fn customers(&self) -> QueryOutcome;
    /// Columns `codigo_colaborador`, `nome_vendedor`.
    async fn sales_reps(&self) -> QueryOutcome;
    /// Columns `codigo_forma`, `descricao`.
    async fn payment_methods(&self, customer: &str) -> QueryOutcome;
    async fn all_payment_methods(&self) -> QueryOutcome;
    /// Columns `codigo_condicao`, `descricao`.
    async fn payment_terms(&self, customer: &str, method: &str) -> QueryOutcome;
    async fn all_payment_terms(&self, method: &str) -> QueryOutcome;
    /// Columns `codigo_produto`, `nome_produto`, `EstoqueDisponivel`.
    async fn available_products(&self, branch: Option<&str>) -> QueryOutcome;
    /// Columns `codigo_produto`, `total_unidades_ativas`.
    async fn product_unit_counts(&self, products: &[String]) -> QueryOutcome;
    /// Columns `pedido`, `serie`.
    async fn sales_orders(&self, issued_on: NaiveDate) -> QueryOutcome;

    async fn lookup_field(
        &self,
        table: &str,
        field: &str,
        condition: Option<(&str, &str)>,
    ) -> FieldLookup;

    /// Column scoping `table` to a branch, when the deployment has one.
    fn branch_column(&self, _table: &str) -> Option<&str> {
        None
    }

    /// Flag stored on the operation type (`natoper`).
    async fn operation_flag(&self, field: &str, operation: &str) -> ConfigFlag {
        let lookup = self
            .lookup_field("natoper", field, Some(("Nat_Codigo", operation)))
            .await;
        ConfigFlag::new("natoper", field, lookup)
    }

    /// Flag stored in a parameter table, scoped to `branch` when the table
    /// has a configured branch column and a branch was chosen. A branch
    /// without its own parameter row reads the table globally.
    async fn branch_flag(&self, table: &str, field: &str, branch: Option<&str>) -> ConfigFlag {
        if let (Some(column), Some(code)) = (self.branch_column(table), branch) {
            match self.lookup_field(table, field, Some((column, code))).await {
                FieldLookup::Absent => debug!(
                    "No {} row for branch {}, reading {}.{} globally",
                    table, code, table, field
                ),
                lookup => return ConfigFlag::new(table, field, lookup),
            }
        }
        let lookup = self.lookup_field(table, field, None).await;
        ConfigFlag::new(table, field, lookup)
    }
}

#[async_trait]
impl ReferenceData for Gateway {
    async fn app_version(&self) -> FieldLookup {
        match self.query(VERSION_SQL, &[]).await {
            QueryOutcome::Rows(table) => table
                .first()
                .and_then(|row| row.get_index(0).cloned())
                .map(FieldLookup::Found)
                .unwrap_or(FieldLookup::Absent),
            QueryOutcome::Empty => FieldLookup::Absent,
            QueryOutcome::Failed(e) => FieldLookup::Failed(e),
        }
    }

    async fn active_branch_count(&self) -> FieldLookup {
        match self.query(ACTIVE_BRANCH_COUNT_SQL, &[]).await {
            QueryOutcome::Rows(table) => table
                .first()
                .and_then(|row| row.get("total").cloned())
                .map(FieldLookup::Found)
                .unwrap_or(FieldLookup::Absent),
            QueryOutcome::Empty => FieldLookup::Absent,
            QueryOutcome::Failed(e) => FieldLookup::Failed(e),
        }
    }

    async fn active_branches(&self) -> QueryOutcome {
        self.query(ACTIVE_BRANCHES_SQL, &[]).await
    }

    async fn operation_types(&self) -> QueryOutcome {
        self.query(OPERATION_TYPES_SQL, &[]).await
    }

    async fn customers(&self) -> QueryOutcome {
        self.query(CUSTOMERS_SQL, &[]).await
    }

    async fn sales_reps(&self) -> QueryOutcome {
        self.query(SALES_REPS_SQL, &[]).await
    }

    async fn payment_methods(&self, customer: &str) -> QueryOutcome {
        self.query(CUSTOMER_PAYMENT_METHODS_SQL, &[Value::from(customer)])
            .await
    }

    async fn all_payment_methods(&self) -> QueryOutcome {
        self.query(ALL_PAYMENT_METHODS_SQL, &[]).await
    }

    async fn payment_terms(&self, customer: &str, method: &str) -> QueryOutcome {
        self.query(
            CUSTOMER_PAYMENT_TERMS_SQL,
            &[Value::from(customer), Value::from(method)],
        )
        .await
    }

    async fn all_payment_terms(&self, method: &str) -> QueryOutcome {
        self.query(ALL_PAYMENT_TERMS_SQL, &[Value::from(method)])
            .await
    }

    async fn available_products(&self, branch: Option<&str>) -> QueryOutcome {
        match branch {
            // One placeholder per UNION arm.
            Some(code) => {
                let params = [Value::from(code), Value::from(code)];
                self.query(&available_products_sql(true), &params).await
            }
            None => self.query(&available_products_sql(false), &[]).await,
        }
    }

    async fn product_unit_counts(&self, products: &[String]) -> QueryOutcome {
        if products.is_empty() {
            return QueryOutcome::Empty;
        }
        let params: Vec<Value> = products.iter().map(|p| Value::from(p.as_str())).collect();
        self.query(&unit_counts_sql(products.len()), &params).await
    }

    async fn sales_orders(&self, issued_on: NaiveDate) -> QueryOutcome {
        let date = issued_on.format("%Y%m%d").to_string();
        self.query(SALES_ORDERS_SQL, &[Value::Text(date)]).await
    }

    async fn lookup_field(
        &self,
        table: &str,
        field: &str,
        condition: Option<(&str, &str)>,
    ) -> FieldLookup {
        Gateway::lookup_field(self, table, field, condition).await
    }

    fn branch_column(&self, table: &str) -> Option<&str> {
        self.branch_columns
            .iter()
            .find(|(t, _)| t.eq_ignore_ascii_case(table))
            .map(|(_, column)| column.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_filter_applies_to_both_union_arms() {
        let scoped = available_products_sql(true);
        assert_eq!(scoped.matches("pf.pfi_filcodigo = ?").count(), 2);
        assert!(!available_products_sql(false).contains('?'));
    }

    #[test]
    fn unit_count_placeholders_match_codes() {
        let sql = unit_counts_sql(3);
        assert!(sql.contains("IN (?,?,?)"));
    }
}
